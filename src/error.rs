//! Public error of thread-tasker.

use crate::prelude::*;

/// Error enumeration for task-related operations.
#[derive(Error, Debug)]
pub enum TaskError {
    /// No record is kept under the given task-id.
    #[error("No task is registered under that id.")]
    NotFound,
    /// The task is still being processed by its thread.
    #[error("The task is already in progress.")]
    AlreadyRunning,
    /// The task has no thread to wait on or stop.
    #[error("The task is not running.")]
    NotRunning,
    /// The waiting budget elapsed before the task finished.
    #[error("Waiting for the task timed out.")]
    Timeout,
    /// The operating system refused to start a thread for the task.
    #[error("The task thread failed to spawn.")]
    Spawn(#[from] std::io::Error),
}

impl TaskError {
    /// Whether the error only reports an elapsed budget, which a caller may retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout)
    }
}
