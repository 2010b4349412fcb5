use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use motion_control::{
    AnimationSpec, AutonomousAbilityGuard, GestureLoop, MockAbilityHolder, MockAnimator,
    MockMover, MockPerception, MockTouch, MovementExecutor, NamedLocation,
};
use nav_coordinator::{LocalizationCoordinator, MockMapStore, NavEvent, NavigationPhaseMachine};
use realtime_session::{
    MockAudioSink, MockTransport, SessionConfig, SessionCoordinator, SessionEvent, TurnHooks,
    TurnStateMachine,
};
use robot_tools::{
    follow_human_tool, go_to_location_tool, move_robot_tool, stop_following_tool,
    turn_robot_tool, ChargingFlapCheck, HumanFollower, MockHumanTracker,
};

#[derive(Parser)]
#[command(name = "robot-daemon")]
#[command(about = "Robot coordination daemon with realtime voice session")]
struct Args {
    /// Realtime service endpoint
    #[arg(long, default_value = "wss://realtime.example.com/v1")]
    realtime_url: String,

    /// API key for the realtime service
    #[arg(long, default_value = "dev-key")]
    api_key: String,

    /// Default movement speed fraction
    #[arg(long, default_value = "0.4")]
    speed: f64,

    /// Run a scripted demo sequence against the mock hardware, then exit
    #[arg(long)]
    demo: bool,
}

/// Bridges turn transitions to the microphone, recognition engine and the
/// gesture loop. The audio-input and recognition engines themselves are
/// external; flags stand in for their handles here.
struct RobotTurnHooks {
    gestures: Arc<GestureLoop>,
    nav: Arc<NavigationPhaseMachine>,
    mic_active: AtomicBool,
    recognition_active: AtomicBool,
    focus_valid: AtomicBool,
}

impl RobotTurnHooks {
    fn new(gestures: Arc<GestureLoop>, nav: Arc<NavigationPhaseMachine>) -> Self {
        Self {
            gestures,
            nav,
            mic_active: AtomicBool::new(false),
            recognition_active: AtomicBool::new(false),
            focus_valid: AtomicBool::new(true),
        }
    }

    fn stop_recognition(&self) {
        // Idempotent; the engine rejects a second stop.
        if self.recognition_active.swap(false, Ordering::AcqRel) {
            debug!("continuous recognition stopped");
        }
    }
}

#[async_trait]
impl TurnHooks for RobotTurnHooks {
    async fn on_enter_listening(&self) {
        if !self.focus_valid.load(Ordering::Acquire) {
            warn!("hardware focus lost, not resuming microphone");
            return;
        }
        self.mic_active.store(true, Ordering::Release);
        self.recognition_active.store(true, Ordering::Release);
        info!("listening");
    }

    async fn on_enter_thinking(&self) {
        self.stop_recognition();
        info!("thinking");
    }

    async fn on_enter_speaking(&self) {
        self.stop_recognition();
        if !self.nav.are_gestures_suppressed() {
            let nav = self.nav.clone();
            self.gestures.start(
                move || !nav.are_gestures_suppressed(),
                || AnimationSpec::named("talk_gesture"),
            );
        }
        info!("speaking");
    }

    async fn on_exit_speaking(&self) {
        self.gestures.stop_now().await;
        debug!("gesture loop stopped after speaking");
    }

    async fn on_session_restart(&self) {
        if self.mic_active.swap(false, Ordering::AcqRel) {
            debug!("audio capture stopped for session restart");
        }
        self.stop_recognition();
        self.gestures.stop_now().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let args = Args::parse();
    info!("robot-daemon starting");
    info!("realtime endpoint: {}", args.realtime_url);

    // Mock hardware backends; real backends plug in behind the same traits.
    let mover = Arc::new(MockMover::new());
    let animator = Arc::new(MockAnimator::new());
    let holder = Arc::new(MockAbilityHolder::new());
    let perception = Arc::new(MockPerception::new());
    let touch = Arc::new(MockTouch::new());
    let map_store = Arc::new(MockMapStore::new());

    let gestures = Arc::new(GestureLoop::new(animator));
    let guard = Arc::new(AutonomousAbilityGuard::new(holder));
    let localization = Arc::new(LocalizationCoordinator::new(map_store));
    let executor = Arc::new(MovementExecutor::new(mover));

    let nav = Arc::new(NavigationPhaseMachine::new(
        gestures.clone(),
        guard,
        perception,
        touch,
        localization,
        executor,
    ));

    let hooks: Arc<RobotTurnHooks> = Arc::new(RobotTurnHooks::new(gestures, nav.clone()));
    let turn = Arc::new(TurnStateMachine::new(hooks.clone()));

    let transport = Arc::new(MockTransport::new());
    let audio = Arc::new(MockAudioSink::new());
    let mut session_config = SessionConfig::new(args.realtime_url, args.api_key);
    session_config.instructions = "You are a helpful robot assistant.".to_string();

    let session = Arc::new(SessionCoordinator::new(
        session_config,
        transport,
        turn,
        hooks,
        audio,
    ));
    session.spawn_event_pump();

    let safety = Arc::new(ChargingFlapCheck::new());
    let tracker = Arc::new(MockHumanTracker::new());
    let follower = HumanFollower::new(nav.clone(), tracker, safety.clone());

    spawn_nav_event_logger(&nav);
    spawn_session_event_logger(&session);

    if args.demo {
        run_demo(&nav, &session, &follower, safety.as_ref(), args.speed).await?;
        info!("demo complete");
        return Ok(());
    }

    session.connect().await?;
    info!("ready; press ctrl-c to stop");
    let _ = tokio::signal::ctrl_c().await;
    info!("robot-daemon shutting down");
    Ok(())
}

fn spawn_nav_event_logger(nav: &Arc<NavigationPhaseMachine>) {
    let mut events = nav.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                NavEvent::PhaseChanged(phase) => info!(?phase, "navigation phase"),
                NavEvent::StatusUpdate {
                    map_status,
                    localization_status,
                } => info!(%map_status, %localization_status, "navigation status"),
            }
        }
    });
}

fn spawn_session_event_logger(session: &Arc<SessionCoordinator>) {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::TranscriptCleared => info!("transcript cleared"),
                SessionEvent::ErrorMessage(message) => warn!(%message, "session error"),
                SessionEvent::MuteChanged(muted) => info!(muted, "mute changed"),
                SessionEvent::SpeechEngineWarmupRequested => {
                    info!("speech engine warmup requested");
                }
            }
        }
    });
}

/// Exercise the whole coordination path against the mock hardware.
async fn run_demo(
    nav: &Arc<NavigationPhaseMachine>,
    session: &Arc<SessionCoordinator>,
    follower: &HumanFollower,
    safety: &ChargingFlapCheck,
    speed: f64,
) -> Result<()> {
    info!("--- demo: localization ---");
    if !nav.localization().saved_map_exists() {
        warn!("no saved map on disk; the mock store will fabricate one");
    }
    nav.handle_service_mode("enterLocalizationMode").await;
    nav.ensure_map_loaded()
        .await
        .map_err(|e| anyhow::anyhow!("map load failed: {e}"))?;
    nav.ensure_localization()
        .await
        .map_err(|e| anyhow::anyhow!("localization failed: {e}"))?;
    nav.handle_service_mode("resumeNormalOperation").await;

    info!("--- demo: movement ---");
    let outcome = move_robot_tool(nav, safety, 1.0, 0.0, Some(speed)).await;
    info!(success = outcome.success, message = %outcome.message, "move tool");
    let outcome = turn_robot_tool(nav, safety, "left", 90.0).await;
    info!(success = outcome.success, message = %outcome.message, "turn tool");
    let outcome = turn_robot_tool(nav, safety, "left", 300.0).await;
    info!(success = outcome.success, message = %outcome.message, "turn tool (out of range)");
    let outcome = go_to_location_tool(
        nav,
        safety,
        NamedLocation {
            name: "kitchen".to_string(),
            x_m: 2.5,
            y_m: 1.0,
        },
    )
    .await;
    info!(success = outcome.success, message = %outcome.message, "go-to tool");

    info!("--- demo: follow ---");
    let outcome = follow_human_tool(follower).await;
    info!(success = outcome.success, message = %outcome.message, "follow tool");
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let outcome = stop_following_tool(follower);
    info!(success = outcome.success, message = %outcome.message, "stop follow tool");

    info!("--- demo: realtime session ---");
    session.connect().await?;
    session
        .send_user_message("What rooms do you know?", true, true)
        .await
        .map_err(|e| anyhow::anyhow!("send failed: {e}"))?;
    session.on_playback_started().await;
    session.on_playback_finished().await;
    session.start_new_session().await?;

    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
