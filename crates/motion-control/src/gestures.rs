use crate::{backoff, AnimationSpec, Animator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pause between two successful animations.
pub const GESTURE_INTERVAL: Duration = Duration::from_secs(2);

/// How often a paused loop re-checks its flags.
const PAUSE_POLL: Duration = Duration::from_millis(200);

/// Consecutive failures before log output escalates from debug to warn.
const FAILURE_LOG_THRESHOLD: u32 = 3;

/// Cooperative background loop playing idle/talk animations on its own
/// worker task while a caller-supplied condition holds.
///
/// Failed animations retry with exponential backoff; the failure counter
/// resets on success and on every fresh `start`. The loop never blocks the
/// caller.
pub struct GestureLoop {
    animator: Arc<dyn Animator>,
    interval: Duration,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

impl GestureLoop {
    pub fn new(animator: Arc<dyn Animator>) -> Self {
        Self::with_interval(animator, GESTURE_INTERVAL)
    }

    pub fn with_interval(animator: Arc<dyn Animator>, interval: Duration) -> Self {
        Self {
            animator,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Start the loop on its own worker task. No-op while already running.
    pub fn start<K, N>(&self, keep_running: K, next_animation: N)
    where
        K: Fn() -> bool + Send + Sync + 'static,
        N: Fn() -> AnimationSpec + Send + Sync + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("gesture loop already running");
            return;
        }

        let token = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = token.clone();
        }

        let animator = self.animator.clone();
        let running = self.running.clone();
        let paused = self.paused.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            debug!("gesture loop started");
            let mut failures: u32 = 0;

            loop {
                if token.is_cancelled() || !keep_running() {
                    break;
                }

                if paused.load(Ordering::Acquire) {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(PAUSE_POLL) => {}
                    }
                    continue;
                }

                let spec = next_animation();
                let animate = async {
                    let handle = animator.build(&spec).await?;
                    animator.run(&handle).await
                };
                let outcome = tokio::select! {
                    _ = token.cancelled() => break,
                    outcome = animate => outcome,
                };

                let delay = match outcome {
                    Ok(()) => {
                        failures = 0;
                        interval
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= FAILURE_LOG_THRESHOLD {
                            warn!(animation = %spec.name, error = %e, failures, "gesture animation keeps failing");
                        } else {
                            debug!(animation = %spec.name, error = %e, "gesture animation failed");
                        }
                        backoff::delay_for_attempt(failures)
                    }
                };

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            running.store(false, Ordering::Release);
            debug!("gesture loop stopped");
        });
    }

    /// Cancel any in-flight animation and halt the loop without waiting for
    /// the worker to unwind.
    pub async fn stop_now(&self) {
        let token = match self.cancel.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => return,
        };
        token.cancel();
        self.animator.cancel_running().await;
    }

    /// Keep the worker alive but stop producing animations.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
