//! nav-coordinator: navigation phase coordination and localization
//!
//! The phase machine at the center of this crate owns the robot's
//! coordination mode and drives gestures, ability holds, perception and
//! touch sensors as one atomic enter/exit protocol per transition. The
//! localization coordinator owns the map cache and the single in-flight
//! localization action. The default build enables the `mock` map store.

mod types;
pub use types::{LocalizationStatus, NavEvent, NavigationPhase};

mod error;
pub use error::{NavError, Result};

mod map;
pub use map::{LocalizeAction, MapHandle, MapStore};

mod localization;
pub use localization::{CriticalSectionHooks, LocalizationCoordinator};

mod phase;
pub use phase::NavigationPhaseMachine;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockLocalizeAction, MockMapStore};
