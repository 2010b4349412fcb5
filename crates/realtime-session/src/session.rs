use crate::protocol::{parse_server_event, ClientEvent, ServerEvent};
use crate::{Result, SessionError, Transport, TransportEvent, TurnHooks, TurnState, TurnStateMachine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

/// Settle delay between disconnect and reconnect during a session restart.
pub const SESSION_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Debounce between cancelling an in-flight response and requesting a new
/// one. A heuristic, not a protocol guarantee; tune as needed.
pub const INTERRUPT_GRACE: Duration = Duration::from_millis(50);

const EVENT_CHANNEL_SIZE: usize = 32;

/// How the assistant listens after a session restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Audio flows through the realtime link; go straight to listening.
    RealtimeAudio,
    /// An external speech engine transcribes; it must warm up first.
    SpeechEngine,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub api_key: String,
    pub instructions: String,
    pub voice: String,
    pub mode: SessionMode,
    pub settle_delay: Duration,
    pub interrupt_grace: Duration,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            instructions: String::new(),
            voice: "alloy".to_string(),
            mode: SessionMode::RealtimeAudio,
            settle_delay: SESSION_SETTLE_DELAY,
            interrupt_grace: INTERRUPT_GRACE,
        }
    }
}

/// Response and playback bookkeeping for the current session. Reset wholesale
/// when a new session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTracking {
    pub current_response_id: Option<String>,
    pub cancelled_response_id: Option<String>,
    pub last_chat_response_id: Option<String>,
    pub is_response_generating: bool,
    pub is_audio_playing: bool,
    pub expecting_final_answer_after_tool_call: bool,
}

impl ResponseTracking {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// User-facing notices from the session layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TranscriptCleared,
    ErrorMessage(String),
    MuteChanged(bool),
    SpeechEngineWarmupRequested,
}

/// Playback side of the audio pipeline; the engine itself is external.
pub trait AudioSink: Send + Sync {
    fn stop_and_clear(&self);
    fn is_playing(&self) -> bool;
}

struct Inner {
    tracking: ResponseTracking,
    pending_connect: Option<oneshot::Sender<std::result::Result<(), String>>>,
}

/// Owns the realtime connection lifecycle, response bookkeeping and the
/// barge-in protocol tying the turn machine to audio playback.
pub struct SessionCoordinator {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    turn: Arc<TurnStateMachine>,
    hooks: Arc<dyn TurnHooks>,
    audio: Arc<dyn AudioSink>,
    restarting: AtomicBool,
    muted: AtomicBool,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        turn: Arc<TurnStateMachine>,
        hooks: Arc<dyn TurnHooks>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            config,
            transport,
            turn,
            hooks,
            audio,
            restarting: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                tracking: ResponseTracking::default(),
                pending_connect: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn turn_machine(&self) -> &Arc<TurnStateMachine> {
        &self.turn
    }

    pub async fn tracking(&self) -> ResponseTracking {
        self.inner.lock().await.tracking.clone()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        if self.muted.swap(muted, Ordering::AcqRel) != muted {
            self.emit(SessionEvent::MuteChanged(muted));
        }
    }

    /// Forward transport events to [`Self::handle_transport_event`] on a
    /// background task.
    pub fn spawn_event_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        let mut events = self.transport.events();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                coordinator.handle_transport_event(event).await;
            }
        })
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Open the realtime link. No-op success when already connected.
    ///
    /// At most one connection request may be pending; its outcome is decided
    /// exactly once, by the transport opening (and the session configuration
    /// going out) or by the link closing/failing first.
    pub async fn connect(&self) -> Result<()> {
        if self.transport.is_connected() {
            debug!("already connected");
            return Ok(());
        }

        let pending = {
            let mut inner = self.inner.lock().await;
            if inner.pending_connect.is_some() {
                return Err(SessionError::ConnectInProgress);
            }
            let (tx, rx) = oneshot::channel();
            inner.pending_connect = Some(tx);
            rx
        };

        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.config.api_key),
        )];
        if let Err(e) = self.transport.connect(&self.config.url, &headers).await {
            let mut inner = self.inner.lock().await;
            inner.pending_connect = None;
            return Err(SessionError::Transport(e.to_string()));
        }

        match pending.await {
            Ok(Ok(())) => {
                info!("realtime session established");
                Ok(())
            }
            Ok(Err(message)) => Err(SessionError::ConnectFailed(message)),
            Err(_) => Err(SessionError::ConnectFailed(
                "connection request dropped".to_string(),
            )),
        }
    }

    async fn resolve_pending_connect(&self, result: std::result::Result<(), String>) {
        let mut inner = self.inner.lock().await;
        if let Some(tx) = inner.pending_connect.take() {
            let _ = tx.send(result);
        }
    }

    /// React to one transport event.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                let configure =
                    ClientEvent::configure(&self.config.instructions, &self.config.voice);
                let result = if self.transport.send(&configure.to_wire()) {
                    Ok(())
                } else {
                    Err("failed to send session configuration".to_string())
                };
                self.resolve_pending_connect(result).await;
            }
            TransportEvent::TextMessage(raw) => {
                self.handle_server_event(parse_server_event(&raw)).await;
            }
            TransportEvent::Closing { code, reason } => {
                debug!(code, %reason, "transport closing");
            }
            TransportEvent::Closed { code, reason } => {
                debug!(code, %reason, "transport closed");
                self.resolve_pending_connect(Err(format!(
                    "closed before session updated: {reason}"
                )))
                .await;
            }
            TransportEvent::Failed(message) => {
                warn!(error = %message, "transport failure");
                self.resolve_pending_connect(Err(message)).await;
            }
        }
    }

    async fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::SessionUpdated => debug!("session configuration acknowledged"),
            ServerEvent::ResponseCreated { response_id } => {
                let mut inner = self.inner.lock().await;
                inner.tracking.current_response_id = Some(response_id);
            }
            ServerEvent::ResponseDone { response_id } => {
                let mut inner = self.inner.lock().await;
                if inner.tracking.cancelled_response_id.as_deref() == Some(response_id.as_str()) {
                    debug!(%response_id, "ignoring completion of cancelled response");
                    return;
                }
                inner.tracking.is_response_generating = false;
                inner.tracking.expecting_final_answer_after_tool_call = false;
                inner.tracking.last_chat_response_id = Some(response_id);
            }
            ServerEvent::AudioDelta => {}
            ServerEvent::Error { message } => {
                self.emit(SessionEvent::ErrorMessage(message));
            }
            ServerEvent::Other(kind) => {
                debug!(event = %kind, "ignoring unhandled server event");
            }
        }
    }

    /// Send a user message, optionally requesting a spoken response.
    ///
    /// Fails fast when disconnected, without touching any state. Barge-in is
    /// applied when allowed and the assistant is audibly speaking.
    pub async fn send_user_message(
        &self,
        text: &str,
        request_response: bool,
        allow_interrupt: bool,
    ) -> Result<()> {
        if !self.transport.is_connected() {
            self.emit(SessionEvent::ErrorMessage(
                "not connected to the realtime service".to_string(),
            ));
            return Err(SessionError::NotConnected);
        }

        if allow_interrupt
            && request_response
            && self.turn.current().await == TurnState::Speaking
            && self.audio.is_playing()
        {
            self.interrupt_response().await;
        }

        if request_response {
            // Only reflect thinking once the send actually executes, so a
            // queued message does not flash the state early.
            self.turn.set_state(TurnState::Thinking).await;
        }

        if !self.transport.send(&ClientEvent::user_text(text).to_wire()) {
            self.emit(SessionEvent::ErrorMessage(
                "failed to send message".to_string(),
            ));
            // Recoverable: fall back to listening rather than wedging.
            self.turn.set_state(TurnState::Listening).await;
            return Err(SessionError::SendFailed("conversation item"));
        }

        if request_response {
            self.request_response(allow_interrupt).await?;
        }
        Ok(())
    }

    /// Deliver a tool result and request the final answer.
    ///
    /// Symmetric to [`Self::send_user_message`] but never interrupts, and
    /// flags that the next audio completion precedes a final answer.
    pub async fn send_tool_result(&self, call_id: &str, output: &str) -> Result<()> {
        if !self.transport.is_connected() {
            self.emit(SessionEvent::ErrorMessage(
                "not connected to the realtime service".to_string(),
            ));
            return Err(SessionError::NotConnected);
        }

        {
            let mut inner = self.inner.lock().await;
            inner.tracking.expecting_final_answer_after_tool_call = true;
        }
        self.turn.set_state(TurnState::Thinking).await;

        if !self
            .transport
            .send(&ClientEvent::tool_output(call_id, output).to_wire())
        {
            let mut inner = self.inner.lock().await;
            inner.tracking.expecting_final_answer_after_tool_call = false;
            drop(inner);
            self.emit(SessionEvent::ErrorMessage(
                "failed to send tool result".to_string(),
            ));
            self.turn.set_state(TurnState::Listening).await;
            return Err(SessionError::SendFailed("tool result"));
        }

        self.request_response(false).await
    }

    async fn request_response(&self, allow_interrupt: bool) -> Result<()> {
        let generating = self.inner.lock().await.tracking.is_response_generating;
        if generating {
            // Prevent overlapping audio streams: cancel, then give the
            // service a moment before asking again.
            self.interrupt_response().await;
            tokio::time::sleep(self.config.interrupt_grace).await;
        } else if self.audio.is_playing() && allow_interrupt {
            self.audio.stop_and_clear();
        }

        {
            let mut inner = self.inner.lock().await;
            inner.tracking.is_response_generating = true;
        }
        if !self.transport.send(&ClientEvent::ResponseCreate.to_wire()) {
            let mut inner = self.inner.lock().await;
            inner.tracking.is_response_generating = false;
            drop(inner);
            self.emit(SessionEvent::ErrorMessage(
                "failed to request a response".to_string(),
            ));
            return Err(SessionError::SendFailed("response request"));
        }
        Ok(())
    }

    /// Barge-in: cancel the in-flight response and silence playback.
    pub async fn interrupt_response(&self) {
        let current = {
            let mut inner = self.inner.lock().await;
            let current = inner.tracking.current_response_id.clone();
            if let Some(id) = &current {
                inner.tracking.cancelled_response_id = Some(id.clone());
            }
            inner.tracking.is_response_generating = false;
            current
        };
        if let Some(response_id) = current {
            debug!(%response_id, "cancelling in-flight response");
            let _ = self
                .transport
                .send(&ClientEvent::ResponseCancel { response_id }.to_wire());
        }
        self.audio.stop_and_clear();
    }

    /// Tear the session down and bring up a fresh one.
    pub async fn start_new_session(&self) -> Result<()> {
        info!("starting new session");
        self.restarting.store(true, Ordering::Release);

        if self.muted.swap(false, Ordering::AcqRel) {
            self.emit(SessionEvent::MuteChanged(false));
        }

        // Capture the in-flight response before the bookkeeping is wiped so
        // the disconnect below can still cancel it.
        let in_flight = {
            let mut inner = self.inner.lock().await;
            let in_flight = inner.tracking.current_response_id.clone();
            inner.tracking.reset();
            in_flight
        };
        self.emit(SessionEvent::TranscriptCleared);

        self.hooks.on_session_restart().await;
        self.audio.stop_and_clear();
        self.turn.set_state(TurnState::Idle).await;

        if let Some(response_id) = in_flight {
            let _ = self
                .transport
                .send(&ClientEvent::ResponseCancel { response_id }.to_wire());
        }
        self.transport.close(1000, "session restart");

        tokio::time::sleep(self.config.settle_delay).await;

        let result = self.connect().await;
        self.restarting.store(false, Ordering::Release);
        match result {
            Ok(()) => {
                match self.config.mode {
                    SessionMode::RealtimeAudio => {
                        self.turn.set_state(TurnState::Listening).await;
                    }
                    SessionMode::SpeechEngine => {
                        self.emit(SessionEvent::SpeechEngineWarmupRequested);
                    }
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                // A late close of the old socket races the reconnect; that
                // particular failure is harmless noise.
                if !message.contains("closed before session updated") {
                    self.emit(SessionEvent::ErrorMessage(format!(
                        "could not restart session: {message}"
                    )));
                }
                Err(e)
            }
        }
    }

    /// Playback engine reports audio started.
    pub async fn on_playback_started(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.tracking.is_audio_playing = true;
        }
        if !self.restarting.load(Ordering::Acquire) {
            self.turn.set_state(TurnState::Speaking).await;
        }
    }

    /// Playback engine reports audio finished.
    pub async fn on_playback_finished(&self) {
        let (expecting_tool_answer, generating) = {
            let mut inner = self.inner.lock().await;
            inner.tracking.is_audio_playing = false;
            (
                inner.tracking.expecting_final_answer_after_tool_call,
                inner.tracking.is_response_generating,
            )
        };
        if self.restarting.load(Ordering::Acquire) {
            return;
        }
        if expecting_tool_answer || generating {
            self.turn.set_state(TurnState::Thinking).await;
        } else {
            self.turn.set_state(TurnState::Listening).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAudioSink, MockTransport};
    use async_trait::async_trait;

    struct NoopHooks;

    #[async_trait]
    impl TurnHooks for NoopHooks {
        async fn on_enter_listening(&self) {}
        async fn on_enter_thinking(&self) {}
        async fn on_enter_speaking(&self) {}
        async fn on_exit_speaking(&self) {}
    }

    struct Rig {
        coordinator: Arc<SessionCoordinator>,
        transport: Arc<MockTransport>,
        audio: Arc<MockAudioSink>,
        turn: Arc<TurnStateMachine>,
    }

    fn rig() -> Rig {
        let transport = Arc::new(MockTransport::new());
        let audio = Arc::new(MockAudioSink::new());
        let hooks: Arc<dyn TurnHooks> = Arc::new(NoopHooks);
        let turn = Arc::new(TurnStateMachine::new(hooks.clone()));

        let mut config = SessionConfig::new("wss://realtime.test/v1", "test-key");
        config.settle_delay = Duration::from_millis(50);
        config.interrupt_grace = Duration::from_millis(1);

        let coordinator = Arc::new(SessionCoordinator::new(
            config,
            transport.clone(),
            turn.clone(),
            hooks,
            audio.clone(),
        ));

        Rig {
            coordinator,
            transport,
            audio,
            turn,
        }
    }

    fn connected_rig() -> Rig {
        let rig = rig();
        rig.transport.set_connected(true);
        rig
    }

    #[tokio::test]
    async fn connect_is_noop_when_already_connected() {
        let rig = connected_rig();

        rig.coordinator.connect().await.unwrap();
        assert_eq!(rig.transport.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn connect_handshake_sends_session_config() {
        let rig = rig();
        rig.coordinator.spawn_event_pump();

        rig.coordinator.connect().await.unwrap();

        assert_eq!(rig.transport.connect_attempts(), 1);
        assert_eq!(rig.transport.sent_types(), vec!["session.update"]);
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_fast_without_state_mutation() {
        let rig = rig();
        let mut events = rig.coordinator.subscribe();

        let result = rig.coordinator.send_user_message("hello", true, true).await;

        assert!(matches!(result, Err(SessionError::NotConnected)));
        assert!(rig.transport.sent_frames().is_empty());
        let tracking = rig.coordinator.tracking().await;
        assert!(!tracking.is_response_generating);
        assert_eq!(rig.turn.current().await, TurnState::Idle);
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::ErrorMessage(_))
        ));
    }

    #[tokio::test]
    async fn message_with_response_moves_to_thinking_and_requests() {
        let rig = connected_rig();

        rig.coordinator
            .send_user_message("hello", true, true)
            .await
            .unwrap();

        assert_eq!(rig.turn.current().await, TurnState::Thinking);
        assert_eq!(
            rig.transport.sent_types(),
            vec!["conversation.item.create", "response.create"]
        );
        assert!(rig.coordinator.tracking().await.is_response_generating);
    }

    #[tokio::test]
    async fn message_without_response_sends_item_only() {
        let rig = connected_rig();

        rig.coordinator
            .send_user_message("context note", false, false)
            .await
            .unwrap();

        assert_eq!(rig.transport.sent_types(), vec!["conversation.item.create"]);
        assert_eq!(rig.turn.current().await, TurnState::Idle);
        assert!(!rig.coordinator.tracking().await.is_response_generating);
    }

    #[tokio::test]
    async fn send_failure_rolls_back_to_listening() {
        let rig = connected_rig();
        rig.transport.set_fail_sends(true);

        let result = rig.coordinator.send_user_message("hello", true, true).await;

        assert!(matches!(result, Err(SessionError::SendFailed(_))));
        assert_eq!(rig.turn.current().await, TurnState::Listening);
        assert!(!rig.coordinator.tracking().await.is_response_generating);
    }

    #[tokio::test]
    async fn barge_in_cancels_current_response_before_sending() {
        let rig = connected_rig();
        rig.coordinator
            .handle_transport_event(TransportEvent::TextMessage(
                r#"{"type":"response.created","response":{"id":"resp_1"}}"#.to_string(),
            ))
            .await;
        rig.turn.set_state(TurnState::Speaking).await;
        rig.audio.set_playing(true);

        rig.coordinator
            .send_user_message("stop, new question", true, true)
            .await
            .unwrap();

        assert_eq!(
            rig.transport.sent_types(),
            vec![
                "response.cancel",
                "conversation.item.create",
                "response.create"
            ]
        );
        assert!(rig.audio.stop_count() >= 1);
        let tracking = rig.coordinator.tracking().await;
        assert_eq!(tracking.cancelled_response_id.as_deref(), Some("resp_1"));
    }

    #[tokio::test]
    async fn second_request_interrupts_generating_response() {
        let rig = connected_rig();

        rig.coordinator
            .send_user_message("first", true, false)
            .await
            .unwrap();
        rig.coordinator
            .handle_transport_event(TransportEvent::TextMessage(
                r#"{"type":"response.created","response":{"id":"resp_1"}}"#.to_string(),
            ))
            .await;

        rig.coordinator
            .send_user_message("second", true, false)
            .await
            .unwrap();

        let types = rig.transport.sent_types();
        assert_eq!(
            types,
            vec![
                "conversation.item.create",
                "response.create",
                "conversation.item.create",
                "response.cancel",
                "response.create"
            ]
        );
        assert!(rig.coordinator.tracking().await.is_response_generating);
    }

    #[tokio::test]
    async fn tool_result_sets_expecting_flag_without_interrupt() {
        let rig = connected_rig();
        rig.turn.set_state(TurnState::Speaking).await;
        rig.audio.set_playing(true);

        rig.coordinator
            .send_tool_result("call_1", r#"{"ok":true}"#)
            .await
            .unwrap();

        let types = rig.transport.sent_types();
        assert!(!types.contains(&"response.cancel".to_string()));
        assert_eq!(
            types,
            vec!["conversation.item.create", "response.create"]
        );
        assert!(
            rig.coordinator
                .tracking()
                .await
                .expecting_final_answer_after_tool_call
        );
        assert_eq!(rig.turn.current().await, TurnState::Thinking);
    }

    #[tokio::test]
    async fn playback_events_drive_turn_state() {
        let rig = connected_rig();

        rig.coordinator.on_playback_started().await;
        assert_eq!(rig.turn.current().await, TurnState::Speaking);
        assert!(rig.coordinator.tracking().await.is_audio_playing);

        rig.coordinator.on_playback_finished().await;
        assert_eq!(rig.turn.current().await, TurnState::Listening);
        assert!(!rig.coordinator.tracking().await.is_audio_playing);
    }

    #[tokio::test]
    async fn playback_finish_goes_to_thinking_while_tool_answer_pending() {
        let rig = connected_rig();
        rig.coordinator
            .send_tool_result("call_1", "{}")
            .await
            .unwrap();

        rig.coordinator.on_playback_started().await;
        rig.coordinator.on_playback_finished().await;

        assert_eq!(rig.turn.current().await, TurnState::Thinking);
    }

    #[tokio::test]
    async fn cancelled_response_completion_is_ignored() {
        let rig = connected_rig();

        rig.coordinator
            .send_user_message("first", true, false)
            .await
            .unwrap();
        rig.coordinator
            .handle_transport_event(TransportEvent::TextMessage(
                r#"{"type":"response.created","response":{"id":"resp_1"}}"#.to_string(),
            ))
            .await;
        rig.coordinator.interrupt_response().await;

        rig.coordinator
            .handle_transport_event(TransportEvent::TextMessage(
                r#"{"type":"response.done","response":{"id":"resp_1"}}"#.to_string(),
            ))
            .await;

        let tracking = rig.coordinator.tracking().await;
        assert_eq!(tracking.last_chat_response_id, None);
    }

    #[tokio::test]
    async fn start_new_session_resets_everything_and_reconnects() {
        let rig = connected_rig();
        rig.coordinator.spawn_event_pump();
        let mut events = rig.coordinator.subscribe();

        rig.coordinator.set_muted(true);
        rig.coordinator
            .send_user_message("old business", true, false)
            .await
            .unwrap();
        rig.turn.set_state(TurnState::Speaking).await;

        rig.coordinator.start_new_session().await.unwrap();

        assert_eq!(rig.turn.current().await, TurnState::Listening);
        assert!(!rig.coordinator.is_muted());
        assert_eq!(rig.coordinator.tracking().await, ResponseTracking::default());
        assert_eq!(rig.transport.connect_attempts(), 1);
        assert!(rig.audio.stop_count() >= 1);

        let mut saw_transcript_cleared = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::TranscriptCleared) {
                saw_transcript_cleared = true;
            }
        }
        assert!(saw_transcript_cleared);
    }

    #[tokio::test]
    async fn playback_events_during_restart_do_not_change_turn_state() {
        let rig = connected_rig();
        rig.coordinator.restarting.store(true, Ordering::Release);

        rig.coordinator.on_playback_started().await;
        assert_eq!(rig.turn.current().await, TurnState::Idle);

        rig.coordinator.on_playback_finished().await;
        assert_eq!(rig.turn.current().await, TurnState::Idle);
    }
}
