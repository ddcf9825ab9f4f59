#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use rgraph::{
    clock::ManualClock, error::GraphError, graph::Graph, node::Node, registry::ResourceRegistry,
    resource::Resource,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Root node: no inputs, one `i32` output.
struct Source {
    output: &'static str,
    value: i32,
    label: &'static str,
    log: Log,
}

#[derive(Default)]
struct SourceData {
    out: Option<Resource<i32>>,
}

impl Node for Source {
    type Data = SourceData;

    fn register(
        &mut self,
        data: &mut Self::Data,
        registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError> {
        data.out = Some(registry.output::<i32>(self.output)?);
        Ok(())
    }

    fn exec(&mut self, data: &mut Self::Data) {
        self.log.lock().unwrap().push(self.label);
        data.out.as_ref().unwrap().set(self.value);
    }
}

/// One `i32` input, one `i32` output computed by a pure function.
struct Map {
    input: &'static str,
    output: &'static str,
    f: fn(i32) -> i32,
    label: &'static str,
    log: Log,
}

#[derive(Default)]
struct MapData {
    input: Option<Resource<i32>>,
    out: Option<Resource<i32>>,
}

impl Node for Map {
    type Data = MapData;

    fn register(
        &mut self,
        data: &mut Self::Data,
        registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError> {
        data.input = Some(registry.input::<i32>(self.input)?);
        data.out = Some(registry.output::<i32>(self.output)?);
        Ok(())
    }

    fn exec(&mut self, data: &mut Self::Data) {
        self.log.lock().unwrap().push(self.label);
        let x = data.input.as_ref().unwrap().get();
        data.out.as_ref().unwrap().set((self.f)(x));
    }
}

/// Two `i32` inputs joined into one output.
struct Join {
    left: &'static str,
    right: &'static str,
    output: &'static str,
    f: fn(i32, i32) -> i32,
    label: &'static str,
    log: Log,
}

#[derive(Default)]
struct JoinData {
    left: Option<Resource<i32>>,
    right: Option<Resource<i32>>,
    out: Option<Resource<i32>>,
}

impl Node for Join {
    type Data = JoinData;

    fn register(
        &mut self,
        data: &mut Self::Data,
        registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError> {
        data.left = Some(registry.input::<i32>(self.left)?);
        data.right = Some(registry.input::<i32>(self.right)?);
        data.out = Some(registry.output::<i32>(self.output)?);
        Ok(())
    }

    fn exec(&mut self, data: &mut Self::Data) {
        self.log.lock().unwrap().push(self.label);
        let left = data.left.as_ref().unwrap().get();
        let right = data.right.as_ref().unwrap().get();
        data.out.as_ref().unwrap().set((self.f)(left, right));
    }
}

/// Consumes a `String` named `x`; used to provoke a type clash.
struct StrSink;

#[derive(Default)]
struct StrSinkData {
    input: Option<Resource<String>>,
}

impl Node for StrSink {
    type Data = StrSinkData;

    fn register(
        &mut self,
        data: &mut Self::Data,
        registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError> {
        data.input = Some(registry.input::<String>("x")?);
        Ok(())
    }

    fn exec(&mut self, _data: &mut Self::Data) {}
}

struct Panicker;

impl Node for Panicker {
    type Data = ();

    fn register(
        &mut self,
        _data: &mut Self::Data,
        _registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError> {
        Ok(())
    }

    fn exec(&mut self, _data: &mut Self::Data) {
        panic!("intentional test panic");
    }
}

/// A -> B -> C with x=1, y=x+2, z=y*3.
fn linear(log: &Log) -> Graph {
    let mut graph = Graph::new();
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "A",
            log: log.clone(),
        })
        .unwrap()
        .set_name("A");
    graph
        .add_node(Map {
            input: "x",
            output: "y",
            f: |x| x + 2,
            label: "B",
            log: log.clone(),
        })
        .unwrap()
        .set_name("B");
    graph
        .add_node(Map {
            input: "y",
            output: "z",
            f: |y| y * 3,
            label: "C",
            log: log.clone(),
        })
        .unwrap()
        .set_name("C");
    graph
}

#[test]
fn linear_pipeline_runs_in_dependency_order() {
    let log = log();
    let mut graph = linear(&log);
    graph.execute_serial().unwrap();

    assert_eq!(graph.resource::<i32>("x").unwrap().get(), 1);
    assert_eq!(graph.resource::<i32>("y").unwrap().get(), 3);
    assert_eq!(graph.resource::<i32>("z").unwrap().get(), 9);
    assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
    assert_eq!(graph.left_to_execute(), 0);
}

#[test]
fn diamond_joins_both_branches() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "A",
            log: log.clone(),
        })
        .unwrap();
    graph
        .add_node(Map {
            input: "x",
            output: "b",
            f: |_| 10,
            label: "B",
            log: log.clone(),
        })
        .unwrap();
    graph
        .add_node(Map {
            input: "x",
            output: "c",
            f: |_| 100,
            label: "C",
            log: log.clone(),
        })
        .unwrap();
    graph
        .add_node(Join {
            left: "b",
            right: "c",
            output: "d",
            f: |b, c| b + c,
            label: "D",
            log: log.clone(),
        })
        .unwrap();
    graph.execute_serial().unwrap();

    assert_eq!(graph.resource::<i32>("d").unwrap().get(), 110);
    let order = log.lock().unwrap();
    assert_eq!(order[0], "A");
    assert_eq!(order[3], "D");
}

#[test]
fn empty_graph_returns_immediately() {
    let mut graph = Graph::new();
    graph.execute_serial().unwrap();
    assert_eq!(graph.num_nodes(), 0);
    assert_eq!(graph.left_to_execute(), 0);
}

#[test]
fn single_root_runs_exactly_once() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Source {
            output: "x",
            value: 42,
            label: "A",
            log: log.clone(),
        })
        .unwrap();
    graph.execute_serial().unwrap();

    assert_eq!(*log.lock().unwrap(), ["A"]);
    let x = graph.resource::<i32>("x").unwrap();
    assert!(x.is_available());
    assert_eq!(x.get(), 42);
}

#[test]
fn unproduced_input_fails_before_any_payload_runs() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Map {
            input: "missing",
            output: "out",
            f: |x| x,
            label: "M",
            log: log.clone(),
        })
        .unwrap();
    let err = graph.execute_serial().unwrap_err();

    assert!(matches!(
        err,
        GraphError::UnmetDependency { ref resource, .. } if &**resource == "missing"
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn prepublished_external_input_satisfies_a_consumer() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Map {
            input: "ext",
            output: "out",
            f: |x| x * 2,
            label: "M",
            log: log.clone(),
        })
        .unwrap();

    graph.resource::<i32>("ext").unwrap().set(21);
    graph.execute_serial().unwrap();
    assert_eq!(graph.resource::<i32>("out").unwrap().get(), 42);
}

#[test]
fn conflicting_declaration_types_fail_the_build() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "A",
            log: log.clone(),
        })
        .unwrap();
    let err = graph.add_node(StrSink).unwrap_err();

    assert!(matches!(
        err,
        GraphError::TypeMismatch { ref name, .. } if &**name == "x"
    ));
}

#[test]
fn typed_lookup_checks_name_and_type() {
    let log = log();
    let graph = linear(&log);

    assert!(matches!(
        graph.resource::<String>("x").unwrap_err(),
        GraphError::TypeMismatch { .. }
    ));
    assert!(matches!(
        graph.resource::<i32>("nope").unwrap_err(),
        GraphError::UnknownResource(_)
    ));
}

#[test]
fn duplicate_producers_resolve_to_the_last_writer() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "P1",
            log: log.clone(),
        })
        .unwrap();
    graph
        .add_node(Source {
            output: "x",
            value: 7,
            label: "P2",
            log: log.clone(),
        })
        .unwrap();
    graph
        .add_node(Map {
            input: "x",
            output: "y",
            f: |x| x,
            label: "M",
            log: log.clone(),
        })
        .unwrap();
    graph.execute_serial().unwrap();

    // FIFO: P1 publishes (scheduling M), P2 overwrites, M reads last.
    assert_eq!(graph.resource::<i32>("x").unwrap().get(), 7);
    assert_eq!(graph.resource::<i32>("y").unwrap().get(), 7);
    assert_eq!(*log.lock().unwrap(), ["P1", "P2", "M"]);
}

#[test]
fn reset_and_rerun_produces_identical_values() {
    let log = log();
    let mut graph = linear(&log);
    graph.execute_serial().unwrap();
    let first: Vec<i32> = ["x", "y", "z"]
        .iter()
        .map(|name| graph.resource::<i32>(name).unwrap().get())
        .collect();

    graph.reset(false);
    for node in graph.nodes() {
        assert!(!node.is_executed());
        assert!(!node.is_scheduled());
        assert!(node.exec_start_time().is_none());
    }
    for cell in graph.resources() {
        assert!(!cell.is_available());
        assert!(cell.time_available().is_none());
    }

    graph.execute_serial().unwrap();
    let second: Vec<i32> = ["x", "y", "z"]
        .iter()
        .map(|name| graph.resource::<i32>(name).unwrap().get())
        .collect();

    assert_eq!(first, second);
    assert_eq!(*log.lock().unwrap(), ["A", "B", "C", "A", "B", "C"]);
}

#[test]
fn reset_is_idempotent() {
    let log = log();
    let mut graph = linear(&log);
    graph.execute_serial().unwrap();
    graph.reset(true);
    graph.reset(true);
    graph.execute_serial().unwrap();
    assert_eq!(graph.resource::<i32>("z").unwrap().get(), 9);
}

#[test]
fn republishing_does_not_retrigger_dependents() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Map {
            input: "p",
            output: "out",
            f: |x| x,
            label: "M",
            log: log.clone(),
        })
        .unwrap();
    let schedules = Arc::new(Mutex::new(0usize));
    let seen = schedules.clone();
    graph.set_schedule_hook(move |_| *seen.lock().unwrap() += 1);

    let p = graph.resource::<i32>("p").unwrap();
    p.set(5);
    p.make_available();
    p.set(6);

    assert_eq!(*schedules.lock().unwrap(), 1);
    graph.execute_serial().unwrap();
    assert_eq!(*log.lock().unwrap(), ["M"]);
    // Value writes after the transition still land; triggering does not repeat.
    assert_eq!(graph.resource::<i32>("out").unwrap().get(), 6);
}

#[test]
fn adding_nodes_after_a_pass_requires_reset() {
    let log = log();
    let mut graph = linear(&log);
    graph.execute_serial().unwrap();

    let err = graph
        .add_node(Source {
            output: "late",
            value: 0,
            label: "L",
            log: log.clone(),
        })
        .unwrap_err();
    assert!(matches!(err, GraphError::ExecutionStarted));

    graph.reset(true);
    graph
        .add_node(Source {
            output: "late",
            value: 0,
            label: "L",
            log: log.clone(),
        })
        .unwrap();
}

#[test]
fn rerunning_without_reset_is_a_no_op() {
    let log = log();
    let mut graph = linear(&log);
    graph.execute_serial().unwrap();
    graph.execute_serial().unwrap();
    assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
}

#[test]
fn schedule_hook_sees_every_enqueue() {
    let log = log();
    let mut graph = linear(&log);
    let names = Arc::new(Mutex::new(Vec::new()));
    let seen = names.clone();
    graph.set_schedule_hook(move |node| seen.lock().unwrap().push(node.name()));
    graph.execute_serial().unwrap();

    assert_eq!(*names.lock().unwrap(), ["A", "B", "C"]);
}

#[test]
fn dot_dump_lists_nodes_resources_and_edges() {
    let log = log();
    let graph = linear(&log);
    let dot = graph.to_dot();

    assert!(dot.starts_with("digraph Graph {"));
    assert!(dot.contains("n0 [shape=box, label=\"A\"]"));
    assert!(dot.contains("r0 [shape=ellipse, label=\"x\"]"));
    // A produces x; B consumes x.
    assert!(dot.contains("n0 -> r0;"));
    assert!(dot.contains("r0 -> n1;"));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn injected_clock_stamps_availability_and_execution() {
    let clock = Arc::new(ManualClock::new(100));
    let log = log();
    let mut graph = Graph::with_clock(clock.clone());
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "A",
            log: log.clone(),
        })
        .unwrap()
        .set_name("A");

    assert!(graph.resource::<i32>("x").unwrap().time_available().is_none());
    graph.execute_serial().unwrap();

    assert_eq!(
        graph.resource::<i32>("x").unwrap().time_available(),
        Some(100)
    );
    let node = graph.nodes().next().unwrap();
    assert_eq!(node.exec_start_time(), Some(100));
}

#[test]
fn can_execute_reflects_input_availability() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Map {
            input: "p",
            output: "out",
            f: |x| x,
            label: "M",
            log: log.clone(),
        })
        .unwrap();

    let node_can_execute = |graph: &Graph| graph.nodes().next().unwrap().can_execute();
    assert!(!node_can_execute(&graph));
    graph.resource::<i32>("p").unwrap().set(1);
    assert!(node_can_execute(&graph));
}

#[test]
fn panicking_payload_poisons_the_pass() {
    let log = log();
    let mut graph = Graph::new();
    graph
        .add_node(Panicker)
        .unwrap()
        .set_name("boom");
    graph
        .add_node(Source {
            output: "x",
            value: 1,
            label: "A",
            log: log.clone(),
        })
        .unwrap();

    let err = graph.execute_serial().unwrap_err();
    assert!(matches!(
        err,
        GraphError::PayloadPanicked { ref node } if &**node == "boom"
    ));
}
