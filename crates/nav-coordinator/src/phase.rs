use crate::{
    CriticalSectionHooks, LocalizationCoordinator, NavEvent, NavigationPhase, Result,
};
use async_trait::async_trait;
use motion_control::{
    AutonomousAbilityGuard, GestureLoop, MotionReport, MoveCommand, MovementExecutor,
    NamedLocation, PerceptionControl, TouchControl, TurnDirection,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

const EVENT_CHANNEL_SIZE: usize = 32;

/// Central coordinator for the robot's navigation phases.
///
/// Owns the phase exclusively; on each transition it drives the gesture
/// loop, the ability hold, perception monitoring and the touch sensors as
/// one enter/exit protocol. Transitions are serialized and idempotent.
pub struct NavigationPhaseMachine {
    phase: Mutex<NavigationPhase>,
    gestures_suppressed: AtomicBool,
    gesture_loop: Arc<GestureLoop>,
    guard: Arc<AutonomousAbilityGuard>,
    perception: Arc<dyn PerceptionControl>,
    touch: Arc<dyn TouchControl>,
    localization: Arc<LocalizationCoordinator>,
    executor: Arc<MovementExecutor>,
    events: broadcast::Sender<NavEvent>,
}

impl NavigationPhaseMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gesture_loop: Arc<GestureLoop>,
        guard: Arc<AutonomousAbilityGuard>,
        perception: Arc<dyn PerceptionControl>,
        touch: Arc<dyn TouchControl>,
        localization: Arc<LocalizationCoordinator>,
        executor: Arc<MovementExecutor>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            phase: Mutex::new(NavigationPhase::NormalOperation),
            gestures_suppressed: AtomicBool::new(false),
            gesture_loop,
            guard,
            perception,
            touch,
            localization,
            executor,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavEvent> {
        self.events.subscribe()
    }

    pub async fn current_phase(&self) -> NavigationPhase {
        *self.phase.lock().await
    }

    /// Whether the turn machine may start gesture animations right now.
    pub fn are_gestures_suppressed(&self) -> bool {
        self.gestures_suppressed.load(Ordering::Acquire)
    }

    pub fn localization(&self) -> &Arc<LocalizationCoordinator> {
        &self.localization
    }

    /// Transition to `target`. Setting the current phase again is a no-op;
    /// side effects fire exactly once per transition.
    pub async fn set_phase(&self, target: NavigationPhase) {
        let mut phase = self.phase.lock().await;
        if *phase == target {
            debug!(?target, "phase unchanged");
            return;
        }
        let previous = *phase;
        *phase = target;
        info!(?previous, ?target, "navigation phase transition");

        // Side effects run with the phase lock held so transitions observe
        // each other fully applied.
        match target {
            NavigationPhase::NormalOperation => self.apply_phase_exit().await,
            NavigationPhase::LocalizationMode | NavigationPhase::NavigationMode => {
                self.apply_phase_entry().await;
            }
        }

        let _ = self.events.send(NavEvent::PhaseChanged(target));
        self.emit_status().await;
    }

    async fn apply_phase_entry(&self) {
        self.gestures_suppressed.store(true, Ordering::Release);
        self.gesture_loop.stop_now().await;
        if let Err(e) = self.guard.ensure_held().await {
            warn!(error = %e, "could not hold autonomous abilities on phase entry");
        }
        if let Err(e) = self.perception.stop_monitoring().await {
            warn!(error = %e, "could not stop perception monitoring");
        }
        if let Err(e) = self.touch.pause().await {
            warn!(error = %e, "could not pause touch sensors");
        }
    }

    async fn apply_phase_exit(&self) {
        self.gestures_suppressed.store(false, Ordering::Release);
        self.guard.release().await;
        if let Err(e) = self.perception.start_monitoring().await {
            warn!(error = %e, "could not resume perception monitoring");
        }
        if let Err(e) = self.touch.resume().await {
            warn!(error = %e, "could not resume touch sensors");
        }
    }

    /// Emit a status update reflecting the actual localization readiness.
    pub async fn emit_status(&self) {
        let status = self.localization.status().await;
        let _ = self.events.send(NavEvent::StatusUpdate {
            map_status: status.map_status_text().to_string(),
            localization_status: status.localization_status_text().to_string(),
        });
    }

    /// Dispatch a service-layer mode-change request. Unknown strings are
    /// logged and ignored.
    pub async fn handle_service_mode(&self, mode: &str) {
        match mode {
            "enterLocalizationMode" => self.set_phase(NavigationPhase::LocalizationMode).await,
            "enterNavigationMode" => self.set_phase(NavigationPhase::NavigationMode).await,
            "resumeNormalOperation" => self.set_phase(NavigationPhase::NormalOperation).await,
            // Status announcement only; the phase does not change.
            "mappingLocalized" => self.emit_status().await,
            other => warn!(mode = other, "ignoring unknown service mode"),
        }
    }

    /// Load the saved map if needed, inside the critical-section protocol.
    pub async fn ensure_map_loaded(&self) -> Result<()> {
        self.localization.ensure_map_loaded_if_needed(self).await
    }

    /// Localize against the loaded map if needed.
    pub async fn ensure_localization(&self) -> Result<()> {
        self.localization.ensure_localization_if_needed().await
    }

    /// Translate the base. Returns to normal operation when done.
    pub async fn move_robot(
        &self,
        forward_m: f64,
        sideways_m: f64,
        speed: Option<f64>,
    ) -> MotionReport {
        self.run_movement(MoveCommand::straight(forward_m, sideways_m, speed))
            .await
    }

    /// Rotate the base in place. Returns to normal operation when done.
    pub async fn turn_robot(
        &self,
        direction: TurnDirection,
        degrees: f64,
        speed: Option<f64>,
    ) -> MotionReport {
        self.run_movement(MoveCommand::turn(direction, degrees, speed))
            .await
    }

    /// Navigate to a saved location. Requires the robot to be localized.
    pub async fn navigate_to_location(
        &self,
        location: NamedLocation,
        speed: Option<f64>,
    ) -> MotionReport {
        if !self.localization.is_localization_ready().await {
            return MotionReport::failed("robot is not localized against a map");
        }
        self.run_movement(MoveCommand::go_to(location, speed)).await
    }

    async fn run_movement(&self, cmd: MoveCommand) -> MotionReport {
        if self.executor.is_busy() {
            return MotionReport::failed("another movement is already in progress");
        }
        if let Err(e) = cmd.validate() {
            return MotionReport::failed(e.to_string());
        }

        self.set_phase(NavigationPhase::NavigationMode).await;

        // Movement must not start until the hold resolved. The phase entry
        // already requested it; this re-check is idempotent and surfaces the
        // failure to the caller.
        if let Err(e) = self.guard.ensure_held().await {
            warn!(error = %e, "aborting movement, robot not prepared");
            self.set_phase(NavigationPhase::NormalOperation).await;
            return MotionReport::failed(format!("failed to prepare robot: {e}"));
        }

        let report = self.executor.execute(cmd).await;

        // Unconditional: the robot never stays stuck in navigation mode.
        self.set_phase(NavigationPhase::NormalOperation).await;
        report
    }
}

#[async_trait]
impl CriticalSectionHooks for NavigationPhaseMachine {
    async fn enter_critical_section(&self) {
        self.apply_phase_entry().await;
    }

    async fn exit_critical_section(&self, success: bool) {
        self.apply_phase_exit().await;
        if success {
            self.emit_status().await;
        } else {
            let _ = self.events.send(NavEvent::StatusUpdate {
                map_status: "map load failed".to_string(),
                localization_status: "not localized".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMapStore;
    use motion_control::{MockAbilityHolder, MockAnimator, MockMover, MockPerception, MockTouch};
    use std::time::Duration;

    struct Rig {
        machine: Arc<NavigationPhaseMachine>,
        mover: Arc<MockMover>,
        holder: Arc<MockAbilityHolder>,
        perception: Arc<MockPerception>,
        touch: Arc<MockTouch>,
    }

    fn rig() -> Rig {
        let mover = Arc::new(MockMover::new());
        let holder = Arc::new(MockAbilityHolder::new());
        let perception = Arc::new(MockPerception::new());
        let touch = Arc::new(MockTouch::new());
        let animator = Arc::new(MockAnimator::new());
        let store = Arc::new(MockMapStore::new());

        let machine = Arc::new(NavigationPhaseMachine::new(
            Arc::new(GestureLoop::new(animator)),
            Arc::new(AutonomousAbilityGuard::new(holder.clone())),
            perception.clone(),
            touch.clone(),
            Arc::new(LocalizationCoordinator::new(store)),
            Arc::new(MovementExecutor::new(mover.clone())),
        ));

        Rig {
            machine,
            mover,
            holder,
            perception,
            touch,
        }
    }

    #[tokio::test]
    async fn same_phase_twice_triggers_side_effects_once() {
        let rig = rig();

        rig.machine
            .set_phase(NavigationPhase::LocalizationMode)
            .await;
        rig.machine
            .set_phase(NavigationPhase::LocalizationMode)
            .await;

        assert_eq!(rig.perception.stop_count(), 1);
        assert_eq!(rig.touch.pause_count(), 1);
        assert_eq!(rig.holder.hold_count(), 1);
    }

    #[tokio::test]
    async fn restricted_phase_entry_and_exit_protocol() {
        let rig = rig();

        rig.machine.set_phase(NavigationPhase::NavigationMode).await;
        assert!(rig.machine.are_gestures_suppressed());
        assert!(!rig.perception.is_monitoring());
        assert!(rig.touch.is_paused());

        rig.machine
            .set_phase(NavigationPhase::NormalOperation)
            .await;
        assert!(!rig.machine.are_gestures_suppressed());
        assert!(rig.perception.is_monitoring());
        assert!(!rig.touch.is_paused());
        assert_eq!(rig.holder.release_count(), 1);
    }

    #[tokio::test]
    async fn movement_returns_to_normal_operation_on_success() {
        let rig = rig();
        let mut events = rig.machine.subscribe();

        let report = rig.machine.move_robot(1.0, 0.0, Some(0.4)).await;
        assert!(report.success);
        assert_eq!(report.error, None);
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
        assert_eq!(rig.mover.call_count(), 1);

        // First transition into navigation mode, then back out.
        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let NavEvent::PhaseChanged(phase) = event {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                NavigationPhase::NavigationMode,
                NavigationPhase::NormalOperation
            ]
        );
    }

    #[tokio::test]
    async fn movement_returns_to_normal_operation_on_failure() {
        let rig = rig();
        rig.mover
            .set_outcome(motion_control::MockOutcome::FailWith("obstacle detected"));

        let report = rig
            .machine
            .turn_robot(TurnDirection::Left, 90.0, None)
            .await;
        assert!(!report.success);
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
    }

    #[tokio::test]
    async fn hold_failure_aborts_movement() {
        let rig = rig();
        rig.holder.fail_holds_with("actuation refused");

        let report = rig.machine.move_robot(1.0, 0.0, None).await;
        assert!(!report.success);
        assert!(report
            .error
            .as_deref()
            .is_some_and(|e| e.contains("failed to prepare robot")));
        assert_eq!(rig.mover.call_count(), 0, "movement never dispatched");
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
    }

    #[tokio::test]
    async fn navigate_requires_localization() {
        let rig = rig();

        let report = rig
            .machine
            .navigate_to_location(
                NamedLocation {
                    name: "kitchen".to_string(),
                    x_m: 1.0,
                    y_m: 2.0,
                },
                None,
            )
            .await;

        assert!(!report.success);
        assert!(report
            .error
            .as_deref()
            .is_some_and(|e| e.contains("not localized")));
        assert_eq!(rig.mover.call_count(), 0);
    }

    #[tokio::test]
    async fn navigate_succeeds_once_localized() {
        let rig = rig();

        rig.machine.ensure_map_loaded().await.unwrap();
        rig.machine.ensure_localization().await.unwrap();

        let report = rig
            .machine
            .navigate_to_location(
                NamedLocation {
                    name: "kitchen".to_string(),
                    x_m: 1.0,
                    y_m: 2.0,
                },
                None,
            )
            .await;
        assert!(report.success);
        assert_eq!(rig.mover.call_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_movement_rejected_without_disturbing_first() {
        let mover = Arc::new(MockMover::with_latency(Duration::from_millis(200)));
        let machine = Arc::new(NavigationPhaseMachine::new(
            Arc::new(GestureLoop::new(Arc::new(MockAnimator::new()))),
            Arc::new(AutonomousAbilityGuard::new(Arc::new(
                MockAbilityHolder::new(),
            ))),
            Arc::new(MockPerception::new()),
            Arc::new(MockTouch::new()),
            Arc::new(LocalizationCoordinator::new(Arc::new(MockMapStore::new()))),
            Arc::new(MovementExecutor::new(mover.clone())),
        ));

        let first = {
            let machine = machine.clone();
            tokio::spawn(async move { machine.move_robot(1.0, 0.0, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = machine.move_robot(0.5, 0.0, None).await;
        assert!(!second.success);
        assert!(second
            .error
            .as_deref()
            .is_some_and(|e| e.contains("already in progress")));

        let first = first.await.unwrap();
        assert!(first.success);
        assert_eq!(mover.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_service_mode_is_ignored() {
        let rig = rig();

        rig.machine.handle_service_mode("doABarrelRoll").await;
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
        assert_eq!(rig.perception.stop_count(), 0);
    }

    #[tokio::test]
    async fn service_modes_map_to_phases() {
        let rig = rig();

        rig.machine.handle_service_mode("enterLocalizationMode").await;
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::LocalizationMode
        );

        rig.machine.handle_service_mode("enterNavigationMode").await;
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NavigationMode
        );

        rig.machine.handle_service_mode("resumeNormalOperation").await;
        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
    }

    #[tokio::test]
    async fn mapping_localized_updates_status_without_phase_change() {
        let rig = rig();
        let mut events = rig.machine.subscribe();

        rig.machine.handle_service_mode("mappingLocalized").await;

        assert_eq!(
            rig.machine.current_phase().await,
            NavigationPhase::NormalOperation
        );
        assert!(matches!(
            events.try_recv(),
            Ok(NavEvent::StatusUpdate { .. })
        ));
    }

    #[tokio::test]
    async fn normal_operation_status_reflects_actual_readiness() {
        let rig = rig();
        rig.machine.ensure_map_loaded().await.unwrap();

        let mut events = rig.machine.subscribe();
        rig.machine.set_phase(NavigationPhase::NavigationMode).await;
        rig.machine
            .set_phase(NavigationPhase::NormalOperation)
            .await;

        let mut last_status = None;
        while let Ok(event) = events.try_recv() {
            if let NavEvent::StatusUpdate {
                localization_status,
                ..
            } = event
            {
                last_status = Some(localization_status);
            }
        }
        // Map is loaded but the robot never localized; the status must not
        // claim otherwise.
        assert_eq!(last_status.as_deref(), Some("not localized"));
    }
}
