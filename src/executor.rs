#[cfg(not(feature = "loom"))]
pub(crate) mod pool;
pub(crate) mod serial;

use crate::{
    error::GraphError,
    node::ExecNode,
    sync::{Arc, Condvar, Mutex, RwLock, Weak},
};
use std::collections::VecDeque;
use tracing::{trace, warn};

type ScheduleHook = Box<dyn Fn(&ExecNode) + Send + Sync>;

/// Scheduling state shared by triggers, workers, and the quiescence latch.
///
/// Everything lives under one mutex: the FIFO ready-queue, the park/run
/// counters, and the shutdown flags. Two condition variables are bound to
/// it: `work` parks idle workers and is notified on every enqueue and on
/// shutdown; `idle` is the quiescence latch, notified whenever a worker
/// parks so the owner can observe the all-parked state without waking the
/// pool. Queue discipline is strict FIFO; work items are never reordered,
/// merged, or deduplicated.
pub(crate) struct Scheduler {
    shared: Mutex<SchedState>,
    work: Condvar,
    idle: Condvar,
    hook: RwLock<Option<ScheduleHook>>,
}

struct SchedState {
    /// Nodes whose inputs are all satisfied, in scheduling order. Weak so a
    /// queue left non-empty by an aborted pass cannot keep nodes alive.
    ready: VecDeque<Weak<ExecNode>>,
    /// Workers currently parked on the condition variable. Only read and
    /// written under the scheduler mutex.
    num_waiting: usize,
    /// Workers currently inside a payload.
    num_running: usize,
    /// Scheduled-but-not-finished nodes.
    num_to_execute: usize,
    quit: bool,
    /// Name of the node whose payload panicked, if any.
    poisoned: Option<Box<str>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            shared: Mutex::new(SchedState {
                ready: VecDeque::new(),
                num_waiting: 0,
                num_running: 0,
                num_to_execute: 0,
                quit: false,
                poisoned: None,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
            hook: RwLock::new(None),
        }
    }

    /// Appends a node to the ready-queue and wakes the workers. Safe to call
    /// re-entrantly from a payload (via a publish): the mutex is released
    /// before the hook runs and before the caller's payload continues.
    pub(crate) fn schedule(&self, node: &Arc<ExecNode>) {
        {
            let mut state = self.shared.lock().expect("Scheduler::schedule: [1]");
            state.ready.push_back(Arc::downgrade(node));
            state.num_to_execute += 1;
        }
        self.work.notify_all();
        trace!(node = %node.name(), "scheduled");
        if let Some(hook) = self
            .hook
            .read()
            .expect("Scheduler::schedule: [2]")
            .as_deref()
        {
            hook(node);
        }
    }

    pub(crate) fn set_hook(&self, hook: ScheduleHook) {
        *self.hook.write().expect("Scheduler::set_hook: [1]") = Some(hook);
    }

    /// Clears the shutdown flags so a graph can run again after a failed
    /// pass without a full reset.
    pub(crate) fn begin_pass(&self) {
        let mut state = self.shared.lock().expect("Scheduler::begin_pass: [1]");
        state.quit = false;
        state.poisoned = None;
    }

    /// Drops queued work and zeroes every counter.
    pub(crate) fn reset(&self) {
        let mut state = self.shared.lock().expect("Scheduler::reset: [1]");
        state.ready.clear();
        state.num_waiting = 0;
        state.num_running = 0;
        state.num_to_execute = 0;
        state.quit = false;
        state.poisoned = None;
    }

    /// Records a payload fault and aborts the pass.
    pub(crate) fn poison(&self, node: &str) {
        warn!(node, "payload panicked; aborting pass");
        {
            let mut state = self.shared.lock().expect("Scheduler::poison: [1]");
            if state.poisoned.is_none() {
                state.poisoned = Some(node.into());
            }
            state.quit = true;
        }
        self.work.notify_all();
        self.idle.notify_all();
    }

    pub(crate) fn poisoned_error(&self) -> Result<(), GraphError> {
        let state = self.shared.lock().expect("Scheduler::poisoned_error: [1]");
        match &state.poisoned {
            Some(node) => Err(GraphError::PayloadPanicked { node: node.clone() }),
            None => Ok(()),
        }
    }

    pub(crate) fn num_running(&self) -> usize {
        self.shared
            .lock()
            .expect("Scheduler::num_running: [1]")
            .num_running
    }

    pub(crate) fn left_to_execute(&self) -> usize {
        self.shared
            .lock()
            .expect("Scheduler::left_to_execute: [1]")
            .num_to_execute
    }

    fn next_ready(&self) -> Option<Weak<ExecNode>> {
        let mut state = self.shared.lock().expect("Scheduler::next_ready: [1]");
        let job = state.ready.pop_front();
        if job.is_some() {
            state.num_running += 1;
        }
        job
    }

    /// Balances the bookkeeping of one popped queue entry. Returns the quit
    /// flag so drain loops can stop after a poisoning.
    fn job_finished(&self) -> bool {
        let mut state = self.shared.lock().expect("Scheduler::job_finished: [1]");
        state.num_running = state
            .num_running
            .checked_sub(1)
            .expect("Scheduler::job_finished: [2]");
        state.num_to_execute = state
            .num_to_execute
            .checked_sub(1)
            .expect("Scheduler::job_finished: [3]");
        state.quit
    }
}
