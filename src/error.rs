use thiserror::Error;

/// Error kind for graph construction and execution failures.
///
/// Construction errors (`TypeMismatch`, `ExecutionStarted`) surface
/// synchronously from [`Graph::add_node`](crate::graph::Graph::add_node) and
/// the registry; the remaining kinds surface from resource lookups and the
/// execution entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// A resource name was re-declared with a different payload type.
    #[error("resource `{name}` declared as `{requested}`, previously declared as `{existing}`")]
    TypeMismatch {
        /// Resource name under which the declarations collided.
        name: Box<str>,
        /// Type recorded by the first declaration.
        existing: &'static str,
        /// Type requested by the conflicting declaration.
        requested: &'static str,
    },
    /// A resource name is not present in the graph.
    #[error("unknown resource `{0}`")]
    UnknownResource(Box<str>),
    /// A required resource has no producer and was not published externally.
    ///
    /// Detected at the start of a pass, before any payload runs.
    #[error("resource `{resource}` required by node `{node}` has no producer")]
    UnmetDependency {
        /// The producer-less resource.
        resource: Box<str>,
        /// A node that requires it.
        node: Box<str>,
    },
    /// Nodes cannot be added once a pass has started.
    ///
    /// [`Graph::reset`](crate::graph::Graph::reset) re-opens the graph for
    /// construction.
    #[error("nodes cannot be added once a pass has started")]
    ExecutionStarted,
    /// A node payload panicked; the pass was aborted.
    #[error("node `{node}` panicked during execution")]
    PayloadPanicked {
        /// Name of the panicking node.
        node: Box<str>,
    },
}
