//! Scheduler error types.

use thiserror::Error;

/// Why a submit call did not create a task. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task owner is missing")]
    MissingOwner,

    #[error("task owner is not a registered identity")]
    InvalidOwner,

    #[error("task body is missing")]
    MissingBody,

    #[error("task delay must not be negative")]
    NegativeDelay,

    #[error("task interval must not be negative")]
    NegativeInterval,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}
