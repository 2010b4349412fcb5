//! motion-control: movement execution, ability holds and gesture loops
//!
//! This crate wraps the asynchronous, fallible base-motion capabilities of the
//! robot behind small coordinators with strict mutual-exclusion and ordering
//! guarantees. The default build enables a `mock` backend so binaries and
//! tests run on any host without robot hardware.

mod types;
pub use types::{
    AnimationHandle, AnimationSpec, MotionEvent, MotionReport, MoveCommand, MoveKind,
    NamedLocation, TurnDirection, DEFAULT_SPEED, MAX_TURN_DEGREES, MIN_TURN_DEGREES,
};

mod error;
pub use error::{MotionError, Result};

mod traits;
pub use traits::{AbilityHolder, Animator, Mover, PerceptionControl, TouchControl};

mod executor;
pub use executor::{MovementExecutor, MOVEMENT_TIMEOUT};

mod ability;
pub use ability::AutonomousAbilityGuard;

mod gestures;
pub use gestures::{GestureLoop, GESTURE_INTERVAL};

pub mod backoff;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{
    MockAbilityHolder, MockAnimator, MockMover, MockOutcome, MockPerception, MockTouch,
};
