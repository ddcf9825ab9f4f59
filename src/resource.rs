use crate::{
    clock::SharedClock,
    error::GraphError,
    node::ExecNode,
    sync::{Arc, AtomicBool, AtomicU64, Ordering, RwLock, Weak},
    types::{Micros, NEVER},
};
use core::{
    any::{Any, TypeId},
    marker::PhantomData,
};
use derive_more::Debug;
use tracing::trace;

/// Type-erased value slot shared between the graph and resource handles.
///
/// A cell is created the first time a name is declared through the registry
/// and lives for the lifetime of the graph. The payload type is erased here;
/// [`Resource`] recovers it. Exactly one producing payload writes the value
/// before the availability transition, and consumers only read after it, so
/// the value lock is uncontended on the hot path.
#[must_use]
#[derive(Debug)]
pub struct ResourceCell {
    name: Box<str>,
    #[debug(skip)]
    type_id: TypeId,
    type_name: &'static str,
    #[debug(skip)]
    value: RwLock<Box<dyn Any + Send + Sync>>,
    #[debug(skip)]
    default_value: fn() -> Box<dyn Any + Send + Sync>,
    #[debug(skip)]
    available: AtomicBool,
    #[debug(skip)]
    time_available: AtomicU64,
    #[debug(skip)]
    has_producer: AtomicBool,
    /// Dependents are triggered in registration order. Weak back-links keep
    /// the graph the single strong root for both sides of the bipartite DAG.
    #[debug(skip)]
    dependents: RwLock<Vec<Weak<ExecNode>>>,
    #[debug(skip)]
    clock: SharedClock,
}

impl ResourceCell {
    pub(crate) fn new<T: Default + Send + Sync + 'static>(name: &str, clock: SharedClock) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            value: RwLock::new(Box::new(T::default())),
            default_value: || Box::new(T::default()),
            available: AtomicBool::new(false),
            time_available: AtomicU64::new(NEVER),
            has_producer: AtomicBool::new(false),
            dependents: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Resource name, unique within its graph.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload type recorded by the first declaration of this name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the value has been published in the current pass.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Timestamp of the availability transition, if it happened.
    #[must_use]
    pub fn time_available(&self) -> Option<Micros> {
        match self.time_available.load(Ordering::Acquire) {
            NEVER => None,
            t => Some(t),
        }
    }

    pub(crate) fn check_type<T: 'static>(&self) -> Result<(), GraphError> {
        if self.type_id == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(GraphError::TypeMismatch {
                name: self.name.clone(),
                existing: self.type_name,
                requested: core::any::type_name::<T>(),
            })
        }
    }

    pub(crate) fn mark_produced(&self) {
        self.has_producer.store(true, Ordering::Release);
    }

    pub(crate) fn has_producer(&self) -> bool {
        self.has_producer.load(Ordering::Acquire)
    }

    pub(crate) fn add_dependent(&self, node: Weak<ExecNode>) {
        self.dependents
            .write()
            .expect("ResourceCell::add_dependent: dependents lock")
            .push(node);
    }

    /// Publishes the cell and triggers dependents on the false -> true
    /// transition. Idempotent within a pass: the availability CAS guarantees
    /// dependents are triggered at most once no matter how many producers
    /// call this concurrently.
    pub(crate) fn publish(&self) {
        if self
            .available
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.time_available
            .store(self.clock.now(), Ordering::Release);
        trace!(resource = &*self.name, "resource available");
        let dependents = self
            .dependents
            .read()
            .expect("ResourceCell::publish: dependents lock");
        for dependent in dependents.iter() {
            if let Some(node) = dependent.upgrade() {
                ExecNode::trigger(&node);
            }
        }
    }

    /// Clears availability without touching the stored value.
    pub(crate) fn clear(&self) {
        self.available.store(false, Ordering::Release);
        self.time_available.store(NEVER, Ordering::Release);
    }

    /// Replaces the stored value with the payload type's default.
    pub(crate) fn reset_value(&self) {
        *self
            .value
            .write()
            .expect("ResourceCell::reset_value: value lock") = (self.default_value)();
    }
}

/// Typed view over a named [`ResourceCell`].
///
/// Handles are produced by the registry at declaration time and by
/// [`Graph::resource`](crate::graph::Graph::resource); in both cases the
/// cell's type tag has already been checked against `T`, so accessors are
/// infallible.
///
/// [`Resource::set`] both writes and publishes; use [`Resource::write`] or
/// [`Resource::modify`] followed by [`Resource::make_available`] to build a
/// value in place (e.g. appending to a buffer) and publish it as a single
/// observable transition.
#[must_use]
pub struct Resource<T> {
    cell: Arc<ResourceCell>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> core::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.cell.name())
            .field("type", &self.cell.type_name())
            .field("available", &self.cell.is_available())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Resource<T> {
    /// The cell's type tag must already have been verified against `T`.
    pub(crate) fn new(cell: Arc<ResourceCell>) -> Self {
        Self {
            cell,
            _marker: PhantomData,
        }
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Whether the value has been published in the current pass.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.cell.is_available()
    }

    /// Timestamp of the availability transition, if it happened.
    #[must_use]
    pub fn time_available(&self) -> Option<Micros> {
        self.cell.time_available()
    }

    /// Publishes the resource, triggering dependent nodes exactly once per
    /// pass. A no-op if the resource is already available.
    pub fn make_available(&self) {
        self.cell.publish();
    }

    /// Writes the value without publishing it.
    pub fn write(&self, value: T) {
        self.modify(|slot| *slot = value);
    }

    /// Writes the value and publishes it.
    pub fn set(&self, value: T) {
        self.write(value);
        self.make_available();
    }

    /// Reads the value through a closure.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self
            .cell
            .value
            .read()
            .expect("Resource::read: value lock");
        f(value
            .downcast_ref::<T>()
            .expect("Resource::read: type tag verified at handle creation"))
    }

    /// Mutates the value in place through a closure, without publishing.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value = self
            .cell
            .value
            .write()
            .expect("Resource::modify: value lock");
        f(value
            .downcast_mut::<T>()
            .expect("Resource::modify: type tag verified at handle creation"))
    }

    /// Returns a copy of the value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.read(T::clone)
    }
}
