use crate::{Result, SafetyMonitor, ToolError};
use async_trait::async_trait;
use motion_control::{TurnDirection, MAX_TURN_DEGREES, MIN_TURN_DEGREES};
use nav_coordinator::NavigationPhaseMachine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the follow loop re-targets the tracked human.
pub const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Gap kept to the tracked human, in meters.
const FOLLOW_DISTANCE_M: f64 = 0.8;

/// A located human relative to the robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanTarget {
    pub distance_m: f64,
    /// Bearing to the target; positive is to the robot's left.
    pub angle_deg: f64,
}

/// Perception-side lookup of the human being followed.
#[async_trait]
pub trait HumanTracker: Send + Sync {
    async fn locate_target(&self) -> Result<Option<HumanTarget>>;
}

/// Single-owner follow session.
///
/// `start` claims the session and fails while one is active; the polling
/// loop runs on its own worker task and deliberately sleeps between ticks.
pub struct HumanFollower {
    nav: Arc<NavigationPhaseMachine>,
    tracker: Arc<dyn HumanTracker>,
    safety: Arc<dyn SafetyMonitor>,
    poll_interval: Duration,
    active: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

impl HumanFollower {
    pub fn new(
        nav: Arc<NavigationPhaseMachine>,
        tracker: Arc<dyn HumanTracker>,
        safety: Arc<dyn SafetyMonitor>,
    ) -> Self {
        Self::with_poll_interval(nav, tracker, safety, FOLLOW_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        nav: Arc<NavigationPhaseMachine>,
        tracker: Arc<dyn HumanTracker>,
        safety: Arc<dyn SafetyMonitor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            nav,
            tracker,
            safety,
            poll_interval,
            active: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Begin following. Fails when a session is already active or the
    /// safety pre-flight refuses movement; no hardware is touched in either
    /// case.
    pub async fn start(&self) -> Result<()> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ToolError::AlreadyFollowing);
        }

        let verdict = self.safety.evaluate_movement_safety().await;
        if !verdict.ok {
            self.active.store(false, Ordering::Release);
            return Err(ToolError::SafetyBlocked(verdict.message));
        }

        let token = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = token.clone();
        }

        let nav = self.nav.clone();
        let tracker = self.tracker.clone();
        let active = self.active.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            info!("follow session started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                let target = match tracker.locate_target().await {
                    Ok(target) => target,
                    Err(e) => {
                        debug!(error = %e, "could not locate follow target");
                        continue;
                    }
                };
                let Some(target) = target else {
                    continue;
                };

                if target.angle_deg.abs() >= MIN_TURN_DEGREES {
                    let direction = if target.angle_deg > 0.0 {
                        TurnDirection::Left
                    } else {
                        TurnDirection::Right
                    };
                    let degrees = target.angle_deg.abs().min(MAX_TURN_DEGREES);
                    let report = nav.turn_robot(direction, degrees, None).await;
                    if !report.success {
                        debug!(error = ?report.error, "follow turn did not complete");
                    }
                } else if target.distance_m > FOLLOW_DISTANCE_M {
                    let forward = target.distance_m - FOLLOW_DISTANCE_M;
                    let report = nav.move_robot(forward, 0.0, None).await;
                    if !report.success {
                        debug!(error = ?report.error, "follow step did not complete");
                    }
                }
            }
            active.store(false, Ordering::Release);
            info!("follow session ended");
        });

        Ok(())
    }

    /// End the session. Safe to call when not following.
    pub fn stop(&self) {
        match self.cancel.lock() {
            Ok(slot) => slot.cancel(),
            Err(_) => warn!("follow cancel token unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHumanTracker;
    use crate::ChargingFlapCheck;
    use motion_control::{
        AutonomousAbilityGuard, GestureLoop, MockAbilityHolder, MockAnimator, MockMover,
        MockPerception, MockTouch, MovementExecutor,
    };
    use nav_coordinator::{LocalizationCoordinator, MockMapStore};

    fn nav_with_mover(mover: Arc<MockMover>) -> Arc<NavigationPhaseMachine> {
        Arc::new(NavigationPhaseMachine::new(
            Arc::new(GestureLoop::new(Arc::new(MockAnimator::new()))),
            Arc::new(AutonomousAbilityGuard::new(Arc::new(
                MockAbilityHolder::new(),
            ))),
            Arc::new(MockPerception::new()),
            Arc::new(MockTouch::new()),
            Arc::new(LocalizationCoordinator::new(Arc::new(MockMapStore::new()))),
            Arc::new(MovementExecutor::new(mover)),
        ))
    }

    fn follower(
        mover: Arc<MockMover>,
        tracker: Arc<MockHumanTracker>,
        safety: Arc<ChargingFlapCheck>,
    ) -> HumanFollower {
        HumanFollower::with_poll_interval(
            nav_with_mover(mover),
            tracker,
            safety,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn second_start_fails_while_active() {
        let follower = follower(
            Arc::new(MockMover::new()),
            Arc::new(MockHumanTracker::new()),
            Arc::new(ChargingFlapCheck::new()),
        );

        follower.start().await.unwrap();
        let second = follower.start().await;
        assert!(matches!(second, Err(ToolError::AlreadyFollowing)));

        follower.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!follower.is_active());
    }

    #[tokio::test]
    async fn safety_block_prevents_start_entirely() {
        let mover = Arc::new(MockMover::new());
        let safety = Arc::new(ChargingFlapCheck::new());
        safety.set_flap_open(true);
        let follower = follower(mover.clone(), Arc::new(MockHumanTracker::new()), safety);

        let result = follower.start().await;
        assert!(matches!(result, Err(ToolError::SafetyBlocked(_))));
        assert!(!follower.is_active(), "claim released after safety block");
        assert_eq!(mover.call_count(), 0);
    }

    #[tokio::test]
    async fn restart_after_stop_is_allowed() {
        let follower = follower(
            Arc::new(MockMover::new()),
            Arc::new(MockHumanTracker::new()),
            Arc::new(ChargingFlapCheck::new()),
        );

        follower.start().await.unwrap();
        follower.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        follower.start().await.unwrap();
        follower.stop();
    }

    #[tokio::test]
    async fn loop_moves_toward_distant_target() {
        let mover = Arc::new(MockMover::new());
        let tracker = Arc::new(MockHumanTracker::new());
        tracker.set_target(HumanTarget {
            distance_m: 2.0,
            angle_deg: 0.0,
        });
        let follower = follower(mover.clone(), tracker, Arc::new(ChargingFlapCheck::new()));

        follower.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        follower.stop();

        assert!(mover.call_count() >= 1, "a follow step was issued");
    }

    #[tokio::test]
    async fn loop_turns_toward_offset_target() {
        let mover = Arc::new(MockMover::new());
        let tracker = Arc::new(MockHumanTracker::new());
        tracker.set_target(HumanTarget {
            distance_m: 0.5,
            angle_deg: -45.0,
        });
        let follower = follower(mover.clone(), tracker, Arc::new(ChargingFlapCheck::new()));

        follower.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        follower.stop();

        assert!(mover.call_count() >= 1, "a corrective turn was issued");
    }

    #[tokio::test]
    async fn close_centered_target_needs_no_motion() {
        let mover = Arc::new(MockMover::new());
        let tracker = Arc::new(MockHumanTracker::new());
        tracker.set_target(HumanTarget {
            distance_m: 0.5,
            angle_deg: 3.0,
        });
        let follower = follower(mover.clone(), tracker, Arc::new(ChargingFlapCheck::new()));

        follower.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        follower.stop();

        assert_eq!(mover.call_count(), 0);
    }
}
