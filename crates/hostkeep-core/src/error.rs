//! Core error types for hostkeep-core

use thiserror::Error;

/// Errors returned when handing a task to a queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed before the task could be accepted
    #[error("task queue is closed, dropping task {task:?}")]
    Closed {
        /// Name of the rejected task
        task: String,
    },

    /// The worker exited unexpectedly, usually because a task panicked
    #[error("task queue worker stopped, dropping task {task:?}")]
    WorkerStopped {
        /// Name of the rejected task
        task: String,
    },
}

impl QueueError {
    /// Name of the task that was not accepted
    #[must_use]
    pub fn task_name(&self) -> &str {
        match self {
            QueueError::Closed { task } | QueueError::WorkerStopped { task } => task,
        }
    }
}
