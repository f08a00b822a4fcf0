//! Error types for pool operations.

use thiserror::Error;

/// Errors produced by the thread manager and its collaborators.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The operation requires the manager to be in the `Started` state.
    #[error("thread manager not started")]
    NotStarted,
    /// A caller-supplied value or configuration is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The pending-task cap is reached and the submission cannot wait it out.
    #[error("too many pending tasks")]
    TooManyPendingTasks,
    /// The OS refused to spawn a worker thread.
    #[error("worker thread spawn failed")]
    Spawn(#[source] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T, E = ManagerError> = std::result::Result<T, E>;
