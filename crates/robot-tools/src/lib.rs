//! robot-tools: assistant-facing command surface for the robot
//!
//! Thin adapters that validate tool arguments, run safety pre-flight checks,
//! drive the navigation coordinator and translate raw motion errors into
//! sentences the assistant can speak back to the user.

mod error;
pub use error::{Result, ToolError};

mod friendly;
pub use friendly::friendly_motion_error;

mod safety;
pub use safety::{ChargingFlapCheck, SafetyMonitor, SafetyVerdict};

mod follow;
pub use follow::{HumanFollower, HumanTarget, HumanTracker, FOLLOW_POLL_INTERVAL};

mod commands;
pub use commands::{
    follow_human_tool, go_to_location_tool, move_robot_tool, stop_following_tool,
    turn_robot_tool, ToolOutcome,
};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockHumanTracker;
