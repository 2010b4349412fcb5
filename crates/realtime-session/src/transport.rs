use crate::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Lifecycle and message events delivered by the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Opened,
    TextMessage(String),
    Closing { code: u16, reason: String },
    Closed { code: u16, reason: String },
    Failed(String),
}

/// A message-oriented bidirectional transport (a WebSocket in production).
///
/// Events are delivered over a broadcast channel rather than callback
/// objects; consumers subscribe and dispatch on their own tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link. Resolves once the connection attempt is underway;
    /// success/failure arrives as [`TransportEvent`]s.
    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<()>;

    /// Queue one text frame. Returns false when the frame could not be
    /// accepted (link down, buffer full).
    fn send(&self, text: &str) -> bool;

    fn close(&self, code: u16, reason: &str);

    fn is_connected(&self) -> bool;

    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}
