//! Resource-driven task-graph executor.
//!
//! This crate runs a Directed Acyclic Graph (DAG) of computation nodes that
//! communicate through named, typed resources. It:
//! - Derives execution order dynamically from resource availability: a node
//!   runs exactly once per pass, as soon as every input it declared has been
//!   published.
//! - Executes either serially or on a fixed pool of worker threads fed by a
//!   shared ready-queue with condition-variable wakeups and quiescence-based
//!   shutdown.
//! - Keeps the same graph shape reusable across passes (`reset` between
//!   per-frame or per-batch runs).
//!
//! Key modules:
//! - `node`: the `Node` interface implemented by units of work, and the
//!   graph-side `ExecNode` wrapper with its trigger protocol.
//! - `resource`: the type-erased resource cell and the typed `Resource`
//!   handle used to read inputs and publish outputs.
//! - `registry`: the builder surface through which a node declares the
//!   resources it consumes and produces.
//! - `graph`: ownership, lifecycle (`add_node`, `reset`), introspection, and
//!   the execution entry points.
//! - `clock`: injectable microsecond time source for availability and
//!   execution timestamps.
//!
//! Quick start:
//! 1. Implement `Node` for your computation: declare inputs and outputs in
//!    `Node::register` via `ResourceRegistry::input`/`output`, keep the
//!    returned handles in your `Data`, and compute in `Node::exec`.
//! 2. Add every node to a `Graph` with `add_node`.
//! 3. Call `execute_serial`, or `execute_threaded(n)` for a worker pool;
//!    `reset` and re-execute for the next pass.
//!
//! Publishing a resource (`Resource::set` or `make_available`) triggers each
//! dependent node; a node whose last input just arrived schedules itself
//! onto the ready-queue. The scheduler mutex orders every publication before
//! the consuming payload, so a payload always observes its inputs complete
//! and final.

/// Injectable time sources for availability and execution timestamps.
pub mod clock;
/// Error kinds surfaced by graph construction, lookups, and execution.
pub mod error;
mod executor;
/// Graph ownership, lifecycle, introspection, and execution entry points.
pub mod graph;
/// The `Node` interface and the graph-side `ExecNode` wrapper.
pub mod node;
/// Construction-time declaration of consumed and produced resources.
pub mod registry;
/// Type-erased resource cells and typed resource handles.
pub mod resource;
mod sync;
/// Common type aliases.
pub mod types;
