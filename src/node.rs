use crate::{
    clock::SharedClock,
    error::GraphError,
    executor::Scheduler,
    registry::ResourceRegistry,
    resource::ResourceCell,
    sync::{Arc, AtomicBool, AtomicU32, AtomicU64, Mutex, Ordering},
    types::{Micros, NEVER},
};
use std::panic::{self, AssertUnwindSafe};
use tracing::trace;

/// A single unit of computation in the graph.
///
/// Nodes are constructed by the caller and handed to
/// [`Graph::add_node`](crate::graph::Graph::add_node), which runs
/// [`Node::register`] once through a fresh [`ResourceRegistry`] so the node
/// can declare the resources it consumes and produces. At run time,
/// [`Node::exec`] is invoked exactly once per pass, as soon as every declared
/// input has been published.
///
/// `Data` is the node's private per-pass state; the handles returned by the
/// registry are typically stored there so `exec` can read inputs and publish
/// outputs.
pub trait Node: Send + 'static {
    /// Private per-pass state, default-constructed by the graph.
    type Data: Default + Send + 'static;

    /// Declares input and output resources. Called once, at construction.
    fn register(
        &mut self,
        data: &mut Self::Data,
        registry: &mut ResourceRegistry<'_>,
    ) -> Result<(), GraphError>;

    /// Runs the computation. Every declared input is available and carries
    /// its final value when this is called.
    fn exec(&mut self, data: &mut Self::Data);
}

/// Graph-side wrapper around a registered [`Node`].
///
/// Holds the type-erased payload thunk, the resource edges, and the
/// scheduling latches. Execution happens at most once per pass: `scheduled`
/// is flipped by a compare-and-swap when the last required resource arrives,
/// and `executed` plus a try-lock on the payload mutex serialize workers
/// that race into the thunk.
#[must_use]
pub struct ExecNode {
    name: Mutex<Box<str>>,
    payload: Mutex<Box<dyn FnMut() + Send>>,
    required: Vec<Arc<ResourceCell>>,
    produced: Vec<Arc<ResourceCell>>,
    /// Number of required resources that have fired a trigger this pass.
    arrivals: AtomicU32,
    scheduled: AtomicBool,
    executed: AtomicBool,
    exec_start: AtomicU64,
    clock: SharedClock,
    sched: Arc<Scheduler>,
}

impl core::fmt::Debug for ExecNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecNode")
            .field("name", &self.name())
            .field(
                "required",
                &self.required.iter().map(|cell| cell.name()).collect::<Vec<_>>(),
            )
            .field(
                "produced",
                &self.produced.iter().map(|cell| cell.name()).collect::<Vec<_>>(),
            )
            .field("scheduled", &self.is_scheduled())
            .field("executed", &self.is_executed())
            .finish_non_exhaustive()
    }
}

impl ExecNode {
    pub(crate) fn new(
        name: &str,
        payload: Box<dyn FnMut() + Send>,
        required: Vec<Arc<ResourceCell>>,
        produced: Vec<Arc<ResourceCell>>,
        clock: SharedClock,
        sched: Arc<Scheduler>,
    ) -> Self {
        Self {
            name: Mutex::new(name.into()),
            payload: Mutex::new(payload),
            required,
            produced,
            arrivals: AtomicU32::new(0),
            scheduled: AtomicBool::new(false),
            executed: AtomicBool::new(false),
            exec_start: AtomicU64::new(NEVER),
            clock,
            sched,
        }
    }

    /// Human-readable node name. Defaults to the node's type name; not
    /// required to be unique.
    #[must_use]
    pub fn name(&self) -> String {
        self.name
            .lock()
            .expect("ExecNode::name: name lock")
            .to_string()
    }

    /// Overrides the node name for diagnostics and dumps.
    pub fn set_name(&self, name: impl Into<Box<str>>) {
        *self.name.lock().expect("ExecNode::set_name: name lock") = name.into();
    }

    /// Resources this node consumes, in declaration order.
    #[must_use]
    pub fn required(&self) -> &[Arc<ResourceCell>] {
        &self.required
    }

    /// Resources this node produces, in declaration order.
    #[must_use]
    pub fn produced(&self) -> &[Arc<ResourceCell>] {
        &self.produced
    }

    /// Whether the node has been placed on the ready-queue this pass.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Whether the node's payload has begun running this pass.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::Acquire)
    }

    /// Timestamp at which the payload began, if it has.
    #[must_use]
    pub fn exec_start_time(&self) -> Option<Micros> {
        match self.exec_start.load(Ordering::Acquire) {
            NEVER => None,
            t => Some(t),
        }
    }

    /// True iff every required resource is available.
    ///
    /// Diagnostic only; scheduling runs on the arrival counter instead.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.required.iter().all(|cell| cell.is_available())
    }

    /// Records one required resource becoming available. Schedules the node
    /// when the last arrival lands; the CAS on `scheduled` serializes
    /// concurrent triggers from distinct producer threads.
    pub(crate) fn trigger(self: &Arc<Self>) {
        let arrived = self.arrivals.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(
            node = %self.name(),
            arrived,
            required = self.required.len(),
            "trigger"
        );
        if arrived as usize >= self.required.len() {
            self.try_schedule();
        }
    }

    /// Seeds the node onto the ready-queue if it has no inputs.
    pub(crate) fn try_seed(self: &Arc<Self>) -> bool {
        self.required.is_empty() && self.try_schedule()
    }

    fn try_schedule(self: &Arc<Self>) -> bool {
        let first = self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.sched.schedule(self);
        }
        first
    }

    /// Runs the payload at most once.
    ///
    /// The `executed` flag and the try-lock are a belt-and-braces interlock:
    /// even if the node were enqueued twice, the second entry either sees
    /// `executed` or fails the try-lock and returns.
    pub(crate) fn invoke(&self) {
        if self.executed.load(Ordering::Acquire) {
            trace!(node = %self.name(), "already executed");
            return;
        }
        let Ok(mut payload) = self.payload.try_lock() else {
            trace!(node = %self.name(), "payload busy");
            return;
        };
        if self.executed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.exec_start.store(self.clock.now(), Ordering::Release);
        trace!(node = %self.name(), "executing");
        if panic::catch_unwind(AssertUnwindSafe(|| (*payload)())).is_err() {
            self.sched.poison(&self.name());
        }
    }

    /// Restores the node to its post-build, pre-execute state.
    pub(crate) fn reset(&self) {
        self.executed.store(false, Ordering::Release);
        self.scheduled.store(false, Ordering::Release);
        self.arrivals.store(0, Ordering::Release);
        self.exec_start.store(NEVER, Ordering::Release);
    }
}
