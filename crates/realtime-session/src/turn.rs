use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Conversational turn-taking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

/// Side effects bound to turn transitions.
///
/// Contracts: entering listening re-checks that hardware focus is still
/// valid before resuming the microphone; entering thinking or speaking stops
/// continuous recognition (idempotent); entering speaking starts the gesture
/// loop unless gestures are suppressed; leaving speaking stops the gesture
/// loop immediately.
#[async_trait]
pub trait TurnHooks: Send + Sync {
    async fn on_enter_listening(&self);
    async fn on_enter_thinking(&self);
    async fn on_enter_speaking(&self);
    async fn on_exit_speaking(&self);

    /// A new session is starting; stop audio capture and gesture activity.
    async fn on_session_restart(&self) {}
}

/// Serialized turn-state machine.
///
/// All transitions pass through one lock; enter/exit hooks fire exactly once
/// per transition, with the exit-speaking hook running after the new state's
/// enter hook.
pub struct TurnStateMachine {
    state: Mutex<TurnState>,
    hooks: Arc<dyn TurnHooks>,
}

impl TurnStateMachine {
    pub fn new(hooks: Arc<dyn TurnHooks>) -> Self {
        Self {
            state: Mutex::new(TurnState::Idle),
            hooks,
        }
    }

    pub async fn current(&self) -> TurnState {
        *self.state.lock().await
    }

    /// Transition to `next`. Same-state transitions are no-ops.
    pub async fn set_state(&self, next: TurnState) {
        let mut state = self.state.lock().await;
        if *state == next {
            return;
        }
        let previous = *state;
        *state = next;
        debug!(?previous, ?next, "turn transition");

        // Hooks run under the lock so concurrent callers observe transitions
        // fully applied, in order.
        match next {
            TurnState::Idle => {}
            TurnState::Listening => self.hooks.on_enter_listening().await,
            TurnState::Thinking => self.hooks.on_enter_thinking().await,
            TurnState::Speaking => self.hooks.on_enter_speaking().await,
        }
        if previous == TurnState::Speaking {
            self.hooks.on_exit_speaking().await;
        }
    }
}
