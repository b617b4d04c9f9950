//! Executor-specific error types
//!
//! Per-task failures are data recorded on the run (`TaskError`); only a
//! malformed task list is an error of the executor itself (`ExecutorError`).

use crate::error::AppError;
use crate::gateway::GatewayError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while building a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Two tasks in the same run share a name
    #[error("Duplicate task name in run: {0}")]
    DuplicateTask(String),
}

/// Failure of a single task, attributed by the run to the task's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    /// Short machine-readable code (an HTTP-style status for platform failures)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl TaskError {
    /// Create a task error from a code and a message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<AppError> for TaskError {
    fn from(err: AppError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<GatewayError> for TaskError {
    fn from(err: GatewayError) -> Self {
        let code = match &err {
            GatewayError::Status { status, .. } => status.to_string(),
            _ => "502".to_string(),
        };
        Self::new(code, err.to_string())
    }
}
