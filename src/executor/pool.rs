use super::Scheduler;
use crate::{error::GraphError, graph::Graph};
use std::thread;
use tracing::{debug, trace};

/// Fixed-size worker pool.
///
/// Spawns `workers` scoped threads, seeds the ready-queue with every node
/// that has no inputs, then waits for quiescence: every worker parked, the
/// queue empty, and no scheduled node unfinished. Only then is `quit` raised
/// and the workers joined, so a pass never terminates with work in flight.
pub(crate) fn run(graph: &Graph, workers: usize) -> Result<(), GraphError> {
    let sched = graph.scheduler();
    debug!(workers, nodes = graph.num_nodes(), "threaded pass started");
    thread::scope(|scope| {
        for worker in 0..workers {
            scope.spawn(move || worker_loop(sched, worker));
        }
        for node in graph.node_arcs() {
            node.try_seed();
        }
        await_quiescent(sched, workers);
        request_quit(sched);
    });
    let result = sched.poisoned_error();
    debug!(ok = result.is_ok(), "threaded pass finished");
    result
}

fn worker_loop(sched: &Scheduler, worker: usize) {
    trace!(worker, "worker started");
    'run: loop {
        {
            let mut state = sched.shared.lock().expect("pool::worker_loop: [1]");
            loop {
                if state.quit {
                    break 'run;
                }
                if !state.ready.is_empty() {
                    break;
                }
                // Park. Quiescence can only be entered by a park transition,
                // so notifying the latch here is sufficient for the owner to
                // observe the all-parked state; parked peers are not woken.
                state.num_waiting += 1;
                sched.idle.notify_all();
                state = sched.work.wait(state).expect("pool::worker_loop: [2]");
                state.num_waiting -= 1;
            }
        }
        // The pop races with sibling workers woken by the same notify; the
        // loser parks again.
        let Some(job) = sched.next_ready() else {
            continue;
        };

        // The store of the resource value and the availability flip
        // happen-before the producer's schedule() under the scheduler
        // mutex, which happens-before this pop under the same mutex, so
        // the payload observes every input's final value.
        if let Some(job) = job.upgrade() {
            job.invoke();
        }
        if sched.job_finished() {
            break;
        }
    }
    trace!(worker, "worker exiting");
}

/// Blocks until every worker is parked with nothing left to run, or until
/// the pass is aborted.
fn await_quiescent(sched: &Scheduler, workers: usize) {
    let mut state = sched.shared.lock().expect("pool::await_quiescent: [1]");
    while !state.quit
        && !(state.num_waiting == workers && state.ready.is_empty() && state.num_to_execute == 0)
    {
        state = sched.idle.wait(state).expect("pool::await_quiescent: [2]");
    }
}

fn request_quit(sched: &Scheduler) {
    {
        let mut state = sched.shared.lock().expect("pool::request_quit: [1]");
        state.quit = true;
    }
    sched.work.notify_all();
}
