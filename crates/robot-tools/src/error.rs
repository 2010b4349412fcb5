use thiserror::Error;

pub type Result<T, E = ToolError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("already following a human")]
    AlreadyFollowing,
    #[error("safety check failed: {0}")]
    SafetyBlocked(String),
    #[error("perception error: {0}")]
    Tracker(String),
}
