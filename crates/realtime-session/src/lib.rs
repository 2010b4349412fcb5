//! realtime-session: conversational turn-taking over a realtime transport
//!
//! The turn machine serializes IDLE/LISTENING/THINKING/SPEAKING transitions
//! and their side-effect hooks; the session coordinator owns the connection
//! lifecycle, response bookkeeping and the barge-in protocol. The transport
//! is a trait mirroring a WebSocket, with a mock backend enabled by default
//! so the whole stack runs on any host.

mod error;
pub use error::{Result, SessionError};

mod transport;
pub use transport::{Transport, TransportEvent};

pub mod protocol;

mod turn;
pub use turn::{TurnHooks, TurnState, TurnStateMachine};

mod session;
pub use session::{
    AudioSink, ResponseTracking, SessionConfig, SessionCoordinator, SessionEvent, SessionMode,
    INTERRUPT_GRACE, SESSION_SETTLE_DELAY,
};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockAudioSink, MockTransport};
