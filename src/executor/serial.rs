use crate::{error::GraphError, graph::Graph};
use tracing::debug;

/// Single-threaded drain loop.
///
/// Seeds the ready-queue with every node that has no inputs, then pops and
/// invokes until the queue is empty. Payloads publish resources, which
/// trigger dependents, which push onto the same queue, so the drain expands
/// to the full transitive closure of the seeded roots.
pub(crate) fn run(graph: &Graph) -> Result<(), GraphError> {
    let sched = graph.scheduler();
    debug!(nodes = graph.num_nodes(), "serial pass started");
    for node in graph.node_arcs() {
        node.try_seed();
    }
    while let Some(job) = sched.next_ready() {
        if let Some(job) = job.upgrade() {
            job.invoke();
        }
        if sched.job_finished() {
            break;
        }
    }
    let result = sched.poisoned_error();
    debug!(ok = result.is_ok(), "serial pass finished");
    result
}
