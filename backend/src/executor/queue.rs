//! Sequential task queue
//!
//! Tasks execute strictly in registration order: each one is awaited to
//! completion before the next starts, because later tasks may target resources
//! created by earlier ones. A failing task is recorded and the run moves on;
//! every task is attempted exactly once.

use super::error::{ExecutorError, TaskError};
use super::task::{Task, TaskOutput};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type ProgressHook = Box<dyn Fn(f64) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Submitted, no task finished yet
    Pending,
    /// At least one task finished
    Running,
    /// Every task finished without error
    Succeeded,
    /// Every task finished and at least one failed
    Failed,
}

impl RunStatus {
    /// Convert the status to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    /// Whether the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "running" => RunStatus::Running,
            "succeeded" => RunStatus::Succeeded,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Pending,
        }
    }
}

/// Outcome of one task within a finished run
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Task name
    pub name: String,
    /// Failure, if the task failed
    pub error: Option<TaskError>,
}

/// Everything a completion handler learns about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier of the run
    pub run_id: Uuid,
    /// One record per task, in registration order
    pub outcomes: Vec<TaskRecord>,
    /// Results of the successful tasks, in registration order
    pub results: Vec<TaskOutput>,
    /// Final progress (always 1.0)
    pub progress: f64,
}

impl RunReport {
    /// Failed tasks with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| (o.name.as_str(), e)))
    }

    /// Number of failed tasks
    pub fn error_count(&self) -> usize {
        self.failures().count()
    }

    /// Terminal status: succeeded iff no task failed
    pub fn status(&self) -> RunStatus {
        if self.error_count() == 0 {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }
}

/// An ordered list of tasks forming one run
pub struct TaskQueue {
    run_id: Uuid,
    tasks: Vec<Task>,
    names: HashSet<String>,
    progress_hook: Option<ProgressHook>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Create an empty run with a fresh identifier
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// Create an empty run with a known identifier (e.g. a persisted setup id)
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            tasks: Vec::new(),
            names: HashSet::new(),
            progress_hook: None,
        }
    }

    /// Identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is registered
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of the registered tasks in execution order
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(Task::name).collect()
    }

    /// Append a task; it will not run until the queue executes
    pub fn add(&mut self, task: Task) -> Result<(), ExecutorError> {
        if !self.names.insert(task.name().to_string()) {
            return Err(ExecutorError::DuplicateTask(task.name().to_string()));
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Register a hook awaited after every task with the updated progress fraction
    pub fn on_progress<F, Fut>(&mut self, hook: F)
    where
        F: Fn(f64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.progress_hook = Some(Box::new(move |fraction| Box::pin(hook(fraction))));
    }

    /// Execute every task in order and return the run report
    pub async fn execute(self) -> RunReport {
        let TaskQueue {
            run_id,
            tasks,
            progress_hook,
            ..
        } = self;

        let total = tasks.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut results = Vec::new();
        let mut progress = 0.0;

        info!(run_id = %run_id, tasks = total, "Starting run");

        for (index, task) in tasks.into_iter().enumerate() {
            let (name, operation) = task.into_parts();
            debug!(run_id = %run_id, task = %name, "Executing task");

            let outcome = AssertUnwindSafe(async move { operation().await })
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(output)) => {
                    results.push(output);
                    None
                }
                Ok(Err(err)) => {
                    warn!(run_id = %run_id, task = %name, error = %err, "Task failed");
                    Some(err)
                }
                Err(_) => {
                    error!(run_id = %run_id, task = %name, "Task panicked");
                    Some(TaskError::new("500", "task panicked"))
                }
            };
            outcomes.push(TaskRecord { name, error });

            progress = (index + 1) as f64 / total as f64;
            if let Some(hook) = &progress_hook {
                hook(progress).await;
            }
        }

        if total == 0 {
            progress = 1.0;
            if let Some(hook) = &progress_hook {
                hook(progress).await;
            }
        }

        let report = RunReport {
            run_id,
            outcomes,
            results,
            progress,
        };

        info!(
            run_id = %run_id,
            failed = report.error_count(),
            status = report.status().as_str(),
            "Run finished"
        );

        report
    }

    /// Start the run in the background and return immediately
    ///
    /// `on_complete` receives the report once every task was attempted. An error
    /// or panic from the handler is logged and goes no further.
    pub fn run<F, Fut>(self, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(RunReport) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        tokio::spawn(async move {
            let run_id = self.run_id;
            let report = self.execute().await;

            match AssertUnwindSafe(async move { on_complete(report).await })
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => debug!(run_id = %run_id, "Completion handler finished"),
                Ok(Err(e)) => {
                    error!(run_id = %run_id, error = %e, "Completion handler failed")
                }
                Err(_) => error!(run_id = %run_id, "Completion handler panicked"),
            }
        })
    }
}
