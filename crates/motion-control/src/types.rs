use crate::{MotionError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default linear/angular speed fraction used when the caller does not pick one.
pub const DEFAULT_SPEED: f64 = 0.4;

/// Accepted turn range in degrees. Smaller turns are not reliably executed by
/// the base controller, larger ones must be split by the caller.
pub const MIN_TURN_DEGREES: f64 = 15.0;
pub const MAX_TURN_DEGREES: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// A saved target the robot can navigate to. Coordinates are map-frame meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: String,
    pub x_m: f64,
    pub y_m: f64,
}

#[derive(Debug, Clone)]
pub enum MoveKind {
    /// Relative translation of the base.
    Straight { forward_m: f64, sideways_m: f64 },
    /// Rotation in place.
    Turn { direction: TurnDirection, degrees: f64 },
    /// Navigation to a saved location on the loaded map.
    GoTo { location: NamedLocation },
}

/// One movement request. Created per invocation; exactly one may be in
/// flight at a time.
#[derive(Debug, Clone)]
pub struct MoveCommand {
    pub kind: MoveKind,
    pub speed: f64,
}

impl MoveCommand {
    pub fn straight(forward_m: f64, sideways_m: f64, speed: Option<f64>) -> Self {
        Self {
            kind: MoveKind::Straight {
                forward_m,
                sideways_m,
            },
            speed: speed.unwrap_or(DEFAULT_SPEED),
        }
    }

    pub fn turn(direction: TurnDirection, degrees: f64, speed: Option<f64>) -> Self {
        Self {
            kind: MoveKind::Turn { direction, degrees },
            speed: speed.unwrap_or(DEFAULT_SPEED),
        }
    }

    pub fn go_to(location: NamedLocation, speed: Option<f64>) -> Self {
        Self {
            kind: MoveKind::GoTo { location },
            speed: speed.unwrap_or(DEFAULT_SPEED),
        }
    }

    /// Validate parameter bounds before any hardware dispatch.
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 || self.speed > 1.0 {
            return Err(MotionError::InvalidCommand(format!(
                "speed {} outside (0, 1]",
                self.speed
            )));
        }
        match &self.kind {
            MoveKind::Straight {
                forward_m,
                sideways_m,
            } => {
                if !forward_m.is_finite() || !sideways_m.is_finite() {
                    return Err(MotionError::InvalidCommand(
                        "translation must be finite".to_string(),
                    ));
                }
                Ok(())
            }
            MoveKind::Turn { degrees, .. } => {
                if !degrees.is_finite()
                    || *degrees < MIN_TURN_DEGREES
                    || *degrees > MAX_TURN_DEGREES
                {
                    return Err(MotionError::InvalidCommand(format!(
                        "turn of {degrees} degrees outside [{MIN_TURN_DEGREES}, {MAX_TURN_DEGREES}]"
                    )));
                }
                Ok(())
            }
            MoveKind::GoTo { .. } => Ok(()),
        }
    }
}

/// Outcome of one movement command. Immutable once produced; exactly one is
/// produced per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionReport {
    pub success: bool,
    pub error: Option<String>,
}

impl MotionReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<()>> for MotionReport {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Progress notifications broadcast by the executor.
#[derive(Debug, Clone)]
pub enum MotionEvent {
    /// Motion control has actually been initiated on the hardware.
    Started,
    /// The command resolved. Carries the same report returned to the caller.
    Finished(MotionReport),
}

/// Identifies an animation resource the animator can build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSpec {
    pub name: String,
}

impl AnimationSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A built animation ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationHandle {
    pub id: Uuid,
    pub spec: AnimationSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_degree_bounds_are_enforced() {
        let too_small = MoveCommand::turn(TurnDirection::Left, 10.0, None);
        assert!(too_small.validate().is_err());

        let too_large = MoveCommand::turn(TurnDirection::Left, 200.0, None);
        assert!(too_large.validate().is_err());

        let ok = MoveCommand::turn(TurnDirection::Right, 90.0, None);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn speed_bounds_are_enforced() {
        assert!(MoveCommand::straight(1.0, 0.0, Some(0.0)).validate().is_err());
        assert!(MoveCommand::straight(1.0, 0.0, Some(1.5)).validate().is_err());
        assert!(MoveCommand::straight(1.0, 0.0, Some(f64::NAN))
            .validate()
            .is_err());
        assert!(MoveCommand::straight(1.0, 0.0, None).validate().is_ok());
    }

    #[test]
    fn report_from_result_carries_error_text() {
        let report: MotionReport = Err::<(), _>(MotionError::Timeout).into();
        assert!(!report.success);
        assert!(report.error.as_deref().is_some_and(|e| e.contains("timeout")));
    }
}
