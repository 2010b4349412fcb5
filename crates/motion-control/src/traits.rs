use crate::{AnimationHandle, AnimationSpec, NamedLocation, Result, TurnDirection};
use async_trait::async_trait;

/// Base motion capability of the robot. Each call resolves when the hardware
/// reports the motion finished, or fails with the hardware's error.
#[async_trait]
pub trait Mover: Send + Sync {
    /// Translate the base by the given relative offsets in meters.
    async fn move_by(&self, forward_m: f64, sideways_m: f64, speed: f64) -> Result<()>;

    /// Rotate the base in place.
    async fn turn_by(&self, direction: TurnDirection, degrees: f64, speed: f64) -> Result<()>;

    /// Drive to a saved location on the currently loaded map.
    async fn navigate_to(&self, location: &NamedLocation, speed: f64) -> Result<()>;

    /// Request cooperative cancellation of whatever motion is in flight.
    async fn cancel_active(&self);
}

/// Hardware hold suppressing background head/body motion.
#[async_trait]
pub trait AbilityHolder: Send + Sync {
    async fn hold(&self) -> Result<()>;
    async fn release(&self) -> Result<()>;
}

/// Builds and runs gesture animations.
#[async_trait]
pub trait Animator: Send + Sync {
    async fn build(&self, spec: &AnimationSpec) -> Result<AnimationHandle>;

    /// Run a built animation to completion.
    async fn run(&self, handle: &AnimationHandle) -> Result<()>;

    /// Cancel whatever animation is currently running, if any.
    async fn cancel_running(&self);
}

/// Human/obstacle perception service.
#[async_trait]
pub trait PerceptionControl: Send + Sync {
    async fn start_monitoring(&self) -> Result<()>;
    async fn stop_monitoring(&self) -> Result<()>;
}

/// Touch sensor service.
#[async_trait]
pub trait TouchControl: Send + Sync {
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
}
