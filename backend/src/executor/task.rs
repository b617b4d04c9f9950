//! Typed task descriptors
//!
//! A `Task` pairs a unique name with a single-call asynchronous operation.
//! Operations are deferred: nothing runs until the owning queue executes.

use super::error::TaskError;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// Value produced by a successful task
pub type TaskOutput = serde_json::Value;

/// Outcome of one task operation
pub type TaskResult = Result<TaskOutput, TaskError>;

type Operation = Box<dyn FnOnce() -> BoxFuture<'static, TaskResult> + Send>;

/// A named, deferred unit of work
pub struct Task {
    name: String,
    operation: Operation,
}

impl Task {
    /// Create a task from a name and a closure producing the operation's future
    ///
    /// The closure is called exactly once, when the task's turn comes in the run.
    /// Any error type convertible into `TaskError` may be returned.
    pub fn new<F, Fut, E>(name: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TaskOutput, E>> + Send + 'static,
        E: Into<TaskError>,
    {
        Self {
            name: name.into(),
            operation: Box::new(move || {
                Box::pin(async move { operation().await.map_err(Into::into) })
            }),
        }
    }

    /// Name used for error attribution
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Operation) {
        (self.name, self.operation)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}
