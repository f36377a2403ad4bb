//! Plan Execution Module
//!
//! Executes the resolved task graph: sequential dependency-ordered task
//! runs, bounded concurrency for fan-out instances, per-task log capture
//! and sentinel bookkeeping.
//!
//! # Architecture
//!
//! - [`engine`]: the run loop and task state machine
//! - [`invoke`]: single subprocess invocations and category discovery
//! - [`pool`]: bounded worker pool for fan-out instances
//! - [`timeline`]: per-task timing for the final summary

pub mod engine;
pub mod invoke;
pub mod pool;
pub mod timeline;

pub use engine::{Engine, ExecError, InternalRunner, RunSummary, TaskState};
pub use invoke::{InvokeError, TableError};
pub use timeline::{EventKind, Timeline};
