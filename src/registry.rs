use crate::{
    clock::SharedClock,
    error::GraphError,
    resource::{Resource, ResourceCell},
    sync::Arc,
    types::IndexMap,
};
use tracing::warn;

/// Construction-time builder handed to [`Node::register`](crate::node::Node::register).
///
/// Interns resources by name: the first declaration of a name creates the
/// cell (default-initialized, tagged with `T`); later declarations reuse it
/// after checking that the type tag matches. Declaring an input records the
/// node as a dependent of the resource; declaring an output records the
/// produced edge only; producers never trigger themselves.
pub struct ResourceRegistry<'g> {
    resources: &'g mut IndexMap<Box<str>, Arc<ResourceCell>>,
    required: &'g mut Vec<Arc<ResourceCell>>,
    produced: &'g mut Vec<Arc<ResourceCell>>,
    clock: &'g SharedClock,
}

impl<'g> ResourceRegistry<'g> {
    pub(crate) fn new(
        resources: &'g mut IndexMap<Box<str>, Arc<ResourceCell>>,
        required: &'g mut Vec<Arc<ResourceCell>>,
        produced: &'g mut Vec<Arc<ResourceCell>>,
        clock: &'g SharedClock,
    ) -> Self {
        Self {
            resources,
            required,
            produced,
            clock,
        }
    }

    /// Declares that this node consumes resource `name` of type `T`.
    ///
    /// The node will not be scheduled until the resource is published.
    ///
    /// # Errors
    /// [`GraphError::TypeMismatch`] if `name` was previously declared with a
    /// different type.
    pub fn input<T>(&mut self, name: &str) -> Result<Resource<T>, GraphError>
    where
        T: Default + Send + Sync + 'static,
    {
        let cell = self.intern::<T>(name)?;
        self.required.push(cell.clone());
        Ok(Resource::new(cell))
    }

    /// Declares that this node produces resource `name` of type `T`.
    ///
    /// Multiple producers for one name are permitted; the value written last
    /// wins, and the availability transition still happens exactly once per
    /// pass.
    ///
    /// # Errors
    /// [`GraphError::TypeMismatch`] if `name` was previously declared with a
    /// different type.
    pub fn output<T>(&mut self, name: &str) -> Result<Resource<T>, GraphError>
    where
        T: Default + Send + Sync + 'static,
    {
        let cell = self.intern::<T>(name)?;
        if cell.has_producer() {
            warn!(resource = name, "multiple producers; last writer wins");
        }
        cell.mark_produced();
        self.produced.push(cell.clone());
        Ok(Resource::new(cell))
    }

    fn intern<T>(&mut self, name: &str) -> Result<Arc<ResourceCell>, GraphError>
    where
        T: Default + Send + Sync + 'static,
    {
        if let Some(cell) = self.resources.get(name) {
            cell.check_type::<T>()?;
            return Ok(cell.clone());
        }
        let cell = Arc::new(ResourceCell::new::<T>(name, self.clock.clone()));
        self.resources.insert(name.into(), cell.clone());
        Ok(cell)
    }
}
