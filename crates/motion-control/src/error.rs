use thiserror::Error;

pub type Result<T, E = MotionError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum MotionError {
    #[error("another movement is already in progress")]
    Busy,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("failed to prepare robot: {0}")]
    PrepareFailed(String),
    #[error("timeout waiting for movement to complete")]
    Timeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("operation cancelled")]
    Cancelled,
}
