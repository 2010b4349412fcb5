use thiserror::Error;

pub type Result<T, E = SessionError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("not connected to the realtime service")]
    NotConnected,
    #[error("a connection attempt is already pending")]
    ConnectInProgress,
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("failed to send {0}")]
    SendFailed(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
}
