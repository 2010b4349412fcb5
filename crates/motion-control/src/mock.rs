//! In-process mock hardware for tests and host-only builds.

use crate::{
    AbilityHolder, AnimationHandle, AnimationSpec, Animator, MotionError, Mover, NamedLocation,
    PerceptionControl, Result, TouchControl, TurnDirection,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Scripted behavior for the next mock calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Succeed,
    FailWith(&'static str),
    /// Never resolve; exercises timeout paths.
    HangForever,
}

async fn settle(latency: Duration, outcome: MockOutcome) -> Result<()> {
    match outcome {
        MockOutcome::Succeed => {
            tokio::time::sleep(latency).await;
            Ok(())
        }
        MockOutcome::FailWith(message) => {
            tokio::time::sleep(latency).await;
            Err(MotionError::Hardware(message.to_string()))
        }
        MockOutcome::HangForever => std::future::pending().await,
    }
}

/// Mock base mover with scriptable outcome and latency.
pub struct MockMover {
    latency: Duration,
    outcome: Mutex<MockOutcome>,
    calls: AtomicUsize,
    cancels: AtomicUsize,
}

impl MockMover {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(1))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            outcome: Mutex::new(MockOutcome::Succeed),
            calls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: MockOutcome) {
        if let Ok(mut slot) = self.outcome.lock() {
            *slot = outcome;
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::Acquire)
    }

    async fn complete(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let outcome = self
            .outcome
            .lock()
            .map(|o| *o)
            .unwrap_or(MockOutcome::Succeed);
        settle(self.latency, outcome).await
    }
}

impl Default for MockMover {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mover for MockMover {
    async fn move_by(&self, _forward_m: f64, _sideways_m: f64, _speed: f64) -> Result<()> {
        self.complete().await
    }

    async fn turn_by(&self, _direction: TurnDirection, _degrees: f64, _speed: f64) -> Result<()> {
        self.complete().await
    }

    async fn navigate_to(&self, _location: &NamedLocation, _speed: f64) -> Result<()> {
        self.complete().await
    }

    async fn cancel_active(&self) {
        self.cancels.fetch_add(1, Ordering::AcqRel);
    }
}

/// Mock ability holder counting acquisitions and releases.
pub struct MockAbilityHolder {
    latency: Duration,
    holds: AtomicUsize,
    releases: AtomicUsize,
    hold_failure: Mutex<Option<&'static str>>,
}

impl MockAbilityHolder {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(1))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            holds: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            hold_failure: Mutex::new(None),
        }
    }

    /// Make every `hold` fail until [`Self::clear_hold_failure`] is called.
    pub fn fail_holds_with(&self, message: &'static str) {
        if let Ok(mut slot) = self.hold_failure.lock() {
            *slot = Some(message);
        }
    }

    pub fn clear_hold_failure(&self) {
        if let Ok(mut slot) = self.hold_failure.lock() {
            *slot = None;
        }
    }

    pub fn hold_count(&self) -> usize {
        self.holds.load(Ordering::Acquire)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

impl Default for MockAbilityHolder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AbilityHolder for MockAbilityHolder {
    async fn hold(&self) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        let failure = self.hold_failure.lock().map(|slot| *slot).unwrap_or(None);
        if let Some(message) = failure {
            return Err(MotionError::Hardware(message.to_string()));
        }
        self.holds.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Mock animator with per-call outcome scripting.
pub struct MockAnimator {
    run_latency: Duration,
    outcome: Mutex<MockOutcome>,
    builds: AtomicUsize,
    runs: AtomicUsize,
    cancels: AtomicUsize,
    built: Mutex<Vec<String>>,
}

impl MockAnimator {
    pub fn new() -> Self {
        Self::with_run_latency(Duration::from_millis(1))
    }

    pub fn with_run_latency(run_latency: Duration) -> Self {
        Self {
            run_latency,
            outcome: Mutex::new(MockOutcome::Succeed),
            builds: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            built: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: MockOutcome) {
        if let Ok(mut slot) = self.outcome.lock() {
            *slot = outcome;
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Acquire)
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::Acquire)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::Acquire)
    }

    pub fn built_names(&self) -> Vec<String> {
        self.built.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn current_outcome(&self) -> MockOutcome {
        self.outcome
            .lock()
            .map(|o| *o)
            .unwrap_or(MockOutcome::Succeed)
    }
}

impl Default for MockAnimator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Animator for MockAnimator {
    async fn build(&self, spec: &AnimationSpec) -> Result<AnimationHandle> {
        self.builds.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut built) = self.built.lock() {
            built.push(spec.name.clone());
        }
        match self.current_outcome() {
            MockOutcome::FailWith(message) => Err(MotionError::Hardware(message.to_string())),
            _ => Ok(AnimationHandle {
                id: Uuid::new_v4(),
                spec: spec.clone(),
            }),
        }
    }

    async fn run(&self, _handle: &AnimationHandle) -> Result<()> {
        let outcome = self.current_outcome();
        settle(self.run_latency, outcome).await?;
        self.runs.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn cancel_running(&self) {
        self.cancels.fetch_add(1, Ordering::AcqRel);
    }
}

/// Mock perception service tracking its monitoring flag.
pub struct MockPerception {
    monitoring: AtomicBool,
    stops: AtomicUsize,
    starts: AtomicUsize,
}

impl MockPerception {
    pub fn new() -> Self {
        Self {
            monitoring: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }
}

impl Default for MockPerception {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PerceptionControl for MockPerception {
    async fn start_monitoring(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::AcqRel);
        self.monitoring.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop_monitoring(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.monitoring.store(false, Ordering::Release);
        Ok(())
    }
}

/// Mock touch sensor service tracking its paused flag.
pub struct MockTouch {
    paused: AtomicBool,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
}

impl MockTouch {
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::Acquire)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::Acquire)
    }
}

impl Default for MockTouch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TouchControl for MockTouch {
    async fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::AcqRel);
        self.paused.store(true, Ordering::Release);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.resumes.fetch_add(1, Ordering::AcqRel);
        self.paused.store(false, Ordering::Release);
        Ok(())
    }
}
