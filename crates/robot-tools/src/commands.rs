//! Thin adapters between assistant tool calls and the navigation surface.

use crate::{friendly_motion_error, HumanFollower, SafetyMonitor, ToolError};
use motion_control::{MotionReport, NamedLocation, TurnDirection};
use nav_coordinator::NavigationPhaseMachine;
use serde::Serialize;

/// Result handed back to the assistant for speaking to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
}

impl ToolOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

fn report_to_outcome(report: MotionReport, ok_message: String) -> ToolOutcome {
    if report.success {
        ToolOutcome::ok(ok_message)
    } else {
        ToolOutcome::failed(friendly_motion_error(report.error.as_deref().unwrap_or("")))
    }
}

/// Pre-flight check shared by every movement tool; a failed verdict stops
/// the command before any hardware is involved.
async fn safety_block(safety: &dyn SafetyMonitor) -> Option<ToolOutcome> {
    let verdict = safety.evaluate_movement_safety().await;
    if verdict.ok {
        None
    } else {
        Some(ToolOutcome::failed(friendly_motion_error(&format!(
            "safety: {}",
            verdict.message
        ))))
    }
}

/// `turn_robot` tool: rotate in place by a spoken direction and angle.
pub async fn turn_robot_tool(
    nav: &NavigationPhaseMachine,
    safety: &dyn SafetyMonitor,
    direction: &str,
    degrees: f64,
) -> ToolOutcome {
    if let Some(blocked) = safety_block(safety).await {
        return blocked;
    }
    let Some(direction) = TurnDirection::parse(direction) else {
        return ToolOutcome::failed("I only know how to turn left or right.");
    };
    report_to_outcome(
        nav.turn_robot(direction, degrees, None).await,
        format!("Okay, I turned {degrees:.0} degrees."),
    )
}

/// `move_robot` tool: relative translation of the base.
pub async fn move_robot_tool(
    nav: &NavigationPhaseMachine,
    safety: &dyn SafetyMonitor,
    forward_m: f64,
    sideways_m: f64,
    speed: Option<f64>,
) -> ToolOutcome {
    if let Some(blocked) = safety_block(safety).await {
        return blocked;
    }
    report_to_outcome(
        nav.move_robot(forward_m, sideways_m, speed).await,
        "Done, I finished the movement.".to_string(),
    )
}

/// `go_to_location` tool: navigate to a saved map location.
pub async fn go_to_location_tool(
    nav: &NavigationPhaseMachine,
    safety: &dyn SafetyMonitor,
    location: NamedLocation,
) -> ToolOutcome {
    if let Some(blocked) = safety_block(safety).await {
        return blocked;
    }
    let name = location.name.clone();
    report_to_outcome(
        nav.navigate_to_location(location, None).await,
        format!("I arrived at {name}."),
    )
}

/// `follow_human` tool: begin the single-owner follow session.
pub async fn follow_human_tool(follower: &HumanFollower) -> ToolOutcome {
    match follower.start().await {
        Ok(()) => ToolOutcome::ok("Okay, I'm following you now."),
        Err(ToolError::AlreadyFollowing) => {
            ToolOutcome::failed("I'm already following someone. Ask me to stop first.")
        }
        Err(ToolError::SafetyBlocked(message)) => {
            ToolOutcome::failed(friendly_motion_error(&format!("safety: {message}")))
        }
        Err(e) => ToolOutcome::failed(friendly_motion_error(&e.to_string())),
    }
}

/// `stop_following` tool: end the follow session.
pub fn stop_following_tool(follower: &HumanFollower) -> ToolOutcome {
    follower.stop();
    ToolOutcome::ok("Okay, I stopped following.")
}
