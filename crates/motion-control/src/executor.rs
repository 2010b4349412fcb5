use crate::{MotionError, MotionEvent, MotionReport, MoveCommand, MoveKind, Mover};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Wall-clock bound on a single movement command.
pub const MOVEMENT_TIMEOUT: Duration = Duration::from_secs(15);

const EVENT_CHANNEL_SIZE: usize = 16;

/// Issues a single move/turn/navigate command to the hardware, enforcing
/// mutual exclusion, parameter validation and a wall-clock timeout.
///
/// Exactly one [`MotionReport`] is produced per command in every path:
/// success, hardware failure, timeout or rejection. Failures never surface as
/// panics or `Err`; they are encoded in the report.
pub struct MovementExecutor {
    mover: Arc<dyn Mover>,
    busy: AtomicBool,
    timeout: Duration,
    events: broadcast::Sender<MotionEvent>,
}

impl MovementExecutor {
    pub fn new(mover: Arc<dyn Mover>) -> Self {
        Self::with_timeout(mover, MOVEMENT_TIMEOUT)
    }

    pub fn with_timeout(mover: Arc<dyn Mover>, timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            mover,
            busy: AtomicBool::new(false),
            timeout,
            events,
        }
    }

    /// Subscribe to started/finished notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MotionEvent> {
        self.events.subscribe()
    }

    /// Whether a command is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Execute one movement command.
    ///
    /// A second command issued while one is pending resolves immediately with
    /// a busy report and does not affect the in-flight command.
    pub async fn execute(&self, cmd: MoveCommand) -> MotionReport {
        if let Err(e) = cmd.validate() {
            debug!(error = %e, "rejecting movement command before dispatch");
            return MotionReport::failed(e.to_string());
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("movement requested while another is pending");
            return MotionReport::failed(MotionError::Busy.to_string());
        }

        let report = self.run_guarded(&cmd).await;
        self.busy.store(false, Ordering::Release);
        let _ = self.events.send(MotionEvent::Finished(report.clone()));
        report
    }

    async fn run_guarded(&self, cmd: &MoveCommand) -> MotionReport {
        info!(kind = ?cmd.kind, speed = cmd.speed, "starting movement");
        let _ = self.events.send(MotionEvent::Started);

        let motion = async {
            match &cmd.kind {
                MoveKind::Straight {
                    forward_m,
                    sideways_m,
                } => {
                    self.mover
                        .move_by(*forward_m, *sideways_m, cmd.speed)
                        .await
                }
                MoveKind::Turn { direction, degrees } => {
                    self.mover.turn_by(*direction, *degrees, cmd.speed).await
                }
                MoveKind::GoTo { location } => self.mover.navigate_to(location, cmd.speed).await,
            }
        };

        match tokio::time::timeout(self.timeout, motion).await {
            Ok(Ok(())) => {
                info!("movement finished");
                MotionReport::ok()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "movement failed");
                MotionReport::failed(e.to_string())
            }
            Err(_) => {
                // The timeout handler finalizes the result; the cancelled
                // hardware future must not produce a second completion.
                warn!(timeout = ?self.timeout, "movement timed out, requesting cancellation");
                self.mover.cancel_active().await;
                MotionReport::failed(MotionError::Timeout.to_string())
            }
        }
    }
}
