//! Task Graph Module
//!
//! Declares tasks, derives dependency edges from artifact paths and
//! decides which tasks need to run.
//!
//! # Structure
//!
//! - [`model`]: core data structures (Task, Action, Invocation)
//! - [`registry`]: registration, edge resolution and topological ordering
//! - [`staleness`]: filesystem-based up-to-date checking

pub mod model;
pub mod registry;
pub mod staleness;

pub use model::{Action, CategoryMode, InternalOp, Invocation, Task};
pub use registry::{ExecutionPlan, GraphError, TaskRegistry};
pub use staleness::is_stale;
