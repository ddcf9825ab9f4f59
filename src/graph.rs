use crate::{
    clock::{MonotonicClock, SharedClock},
    error::GraphError,
    executor::{self, Scheduler},
    node::{ExecNode, Node},
    registry::ResourceRegistry,
    resource::{Resource, ResourceCell},
    sync::Arc,
    types::IndexMap,
};
use core::fmt::Write as _;
use derive_more::Debug;

/// Owner of the bipartite DAG of [`ExecNode`]s and resources.
///
/// A graph is built single-threadedly with [`Graph::add_node`], then executed
/// with [`Graph::execute_serial`] or [`Graph::execute_threaded`]. One full
/// execution is a *pass*; [`Graph::reset`] separates passes, restoring every
/// node and resource to its post-build state so the same graph shape can be
/// rerun with fresh inputs.
///
/// The graph is the single strong root: nodes hold strong references to
/// their resources, resources hold weak back-links to dependent nodes.
#[must_use]
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Arc<ExecNode>>,
    resources: IndexMap<Box<str>, Arc<ResourceCell>>,
    #[debug(skip)]
    sched: Arc<Scheduler>,
    #[debug(skip)]
    clock: SharedClock,
    started: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph backed by a [`MonotonicClock`].
    pub fn new() -> Self {
        Self::with_clock(std::sync::Arc::new(MonotonicClock::new()))
    }

    /// Creates an empty graph with an injected time source.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            nodes: Vec::new(),
            resources: IndexMap::default(),
            sched: Arc::new(Scheduler::new()),
            clock,
            started: false,
        }
    }

    /// Registers a node: default-constructs its data, runs
    /// [`Node::register`] through a fresh registry, and wires the node as a
    /// dependent of every declared input. Inputs that are already available
    /// count as arrived, so resources published before registration behave
    /// like resources published after it.
    ///
    /// The returned reference is valid until the next mutation of the graph;
    /// use it to rename the node or inspect its edges.
    ///
    /// # Errors
    /// [`GraphError::TypeMismatch`] from conflicting resource declarations,
    /// or [`GraphError::ExecutionStarted`] once a pass has run and the graph
    /// was not reset.
    pub fn add_node<N: Node>(&mut self, node: N) -> Result<&ExecNode, GraphError> {
        if self.started {
            return Err(GraphError::ExecutionStarted);
        }
        let mut node = node;
        let mut data = N::Data::default();
        let mut required = Vec::new();
        let mut produced = Vec::new();
        {
            let mut registry = ResourceRegistry::new(
                &mut self.resources,
                &mut required,
                &mut produced,
                &self.clock,
            );
            node.register(&mut data, &mut registry)?;
        }
        let payload: Box<dyn FnMut() + Send> = Box::new(move || node.exec(&mut data));
        let exec = Arc::new(ExecNode::new(
            core::any::type_name::<N>(),
            payload,
            required,
            produced,
            self.clock.clone(),
            self.sched.clone(),
        ));
        for cell in exec.required() {
            cell.add_dependent(Arc::downgrade(&exec));
            if cell.is_available() {
                ExecNode::trigger(&exec);
            }
        }
        self.nodes.push(exec);
        Ok(self.nodes.last().expect("Graph::add_node: just pushed"))
    }

    /// Installs a callback invoked whenever a node is enqueued on the
    /// ready-queue. Runs on whichever thread scheduled the node, outside the
    /// scheduler mutex.
    pub fn set_schedule_hook(&mut self, hook: impl Fn(&ExecNode) + Send + Sync + 'static) {
        self.sched.set_hook(Box::new(hook));
    }

    /// Registered nodes, in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExecNode> {
        self.nodes.iter().map(|node| &**node)
    }

    /// Registered resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceCell> {
        self.resources.values().map(|cell| &**cell)
    }

    /// Fetches a typed handle to resource `name`.
    ///
    /// # Errors
    /// [`GraphError::UnknownResource`] if the name was never declared, or
    /// [`GraphError::TypeMismatch`] if it was declared with a different type.
    pub fn resource<T>(&self, name: &str) -> Result<Resource<T>, GraphError>
    where
        T: Send + Sync + 'static,
    {
        let cell = self
            .resources
            .get(name)
            .ok_or_else(|| GraphError::UnknownResource(name.into()))?;
        cell.check_type::<T>()?;
        Ok(Resource::new(cell.clone()))
    }

    /// Restores the graph to its post-build, pre-execute state: clears every
    /// node's latches and arrival counter, every resource's availability,
    /// and the scheduler's queue and counters. Idempotent.
    ///
    /// With `destroy_resources`, stored values are also replaced by their
    /// type's default; otherwise values survive the reset (only the
    /// availability flag is cleared).
    pub fn reset(&mut self, destroy_resources: bool) {
        for node in &self.nodes {
            node.reset();
        }
        for cell in self.resources.values() {
            cell.clear();
            if destroy_resources {
                cell.reset_value();
            }
        }
        self.sched.reset();
        self.started = false;
    }

    /// Executes the graph on the calling thread.
    ///
    /// # Errors
    /// [`GraphError::UnmetDependency`] before any payload runs, or
    /// [`GraphError::PayloadPanicked`] if a payload panicked.
    pub fn execute_serial(&mut self) -> Result<(), GraphError> {
        self.prepare()?;
        executor::serial::run(self)
    }

    /// Executes the graph on a pool of `workers` threads, returning once the
    /// pass is quiescent and every worker has been joined.
    ///
    /// # Errors
    /// [`GraphError::UnmetDependency`] before any worker runs, or
    /// [`GraphError::PayloadPanicked`] if a payload panicked.
    #[cfg(not(feature = "loom"))]
    pub fn execute_threaded(&mut self, workers: core::num::NonZeroUsize) -> Result<(), GraphError> {
        self.prepare()?;
        executor::pool::run(self, workers.get())
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of registered resources.
    #[must_use]
    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    /// Workers currently inside a payload.
    #[must_use]
    pub fn num_running(&self) -> usize {
        self.sched.num_running()
    }

    /// Scheduled-but-not-finished nodes.
    #[must_use]
    pub fn left_to_execute(&self) -> usize {
        self.sched.left_to_execute()
    }

    /// Renders the graph as Graphviz DOT: nodes as boxes, resources as
    /// ellipses, with an edge per required (resource -> node) and produced
    /// (node -> resource) declaration. The exact format is not contractual.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from(
            "digraph Graph {\n\
             \trankdir=LR;\n\
             \tnode [fontname=\"monospace\", fontsize=10];\n",
        );
        for (idx, node) in self.nodes.iter().enumerate() {
            let _ = writeln!(
                dot,
                "\tn{idx} [shape=box, label=\"{}\"];",
                escape(&node.name())
            );
        }
        for (idx, name) in self.resources.keys().enumerate() {
            let _ = writeln!(dot, "\tr{idx} [shape=ellipse, label=\"{}\"];", escape(name));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            for cell in node.required() {
                let resource = self
                    .resources
                    .get_index_of(cell.name())
                    .expect("Graph::to_dot: [1]");
                let _ = writeln!(dot, "\tr{resource} -> n{idx};");
            }
            for cell in node.produced() {
                let resource = self
                    .resources
                    .get_index_of(cell.name())
                    .expect("Graph::to_dot: [2]");
                let _ = writeln!(dot, "\tn{idx} -> r{resource};");
            }
        }
        dot.push_str("}\n");
        dot
    }

    pub(crate) fn node_arcs(&self) -> &[Arc<ExecNode>] {
        &self.nodes
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Verifies that every required resource either has a registered
    /// producer or was already published externally, then marks the graph as
    /// executing. Runs before any payload; a failed check leaves the graph
    /// open for further construction.
    fn prepare(&mut self) -> Result<(), GraphError> {
        for node in &self.nodes {
            for cell in node.required() {
                if !cell.has_producer() && !cell.is_available() {
                    return Err(GraphError::UnmetDependency {
                        resource: cell.name().into(),
                        node: node.name().into_boxed_str(),
                    });
                }
            }
        }
        self.started = true;
        self.sched.begin_pass();
        Ok(())
    }
}

fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}
