//! Task execution module
//!
//! Runs a named, ordered list of asynchronous operations one after another,
//! reporting fractional progress and collecting per-task failures without
//! aborting the tasks that follow.

pub mod error;
pub mod queue;
pub mod task;

pub use error::{ExecutorError, TaskError};
pub use queue::{RunReport, RunStatus, TaskQueue, TaskRecord};
pub use task::{Task, TaskOutput, TaskResult};
