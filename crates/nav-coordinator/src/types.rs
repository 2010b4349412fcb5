use serde::{Deserialize, Serialize};

/// Coordination mode governing which hardware services are paused.
///
/// Exactly one phase is active at a time; transitions go through
/// [`crate::NavigationPhaseMachine::set_phase`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPhase {
    NormalOperation,
    LocalizationMode,
    NavigationMode,
}

/// Derived localization readiness; computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizationStatus {
    NoMap,
    MapLoadedNotLocalized,
    Localizing,
    Localized,
    LocalizationFailed,
}

impl LocalizationStatus {
    pub fn map_status_text(&self) -> &'static str {
        match self {
            Self::NoMap => "no map loaded",
            _ => "map loaded",
        }
    }

    pub fn localization_status_text(&self) -> &'static str {
        match self {
            Self::NoMap => "not localized",
            Self::MapLoadedNotLocalized => "not localized",
            Self::Localizing => "localizing...",
            Self::Localized => "localized",
            Self::LocalizationFailed => "localization failed",
        }
    }
}

/// Notifications for UI observers of the navigation subsystem.
#[derive(Debug, Clone)]
pub enum NavEvent {
    PhaseChanged(NavigationPhase),
    StatusUpdate {
        map_status: String,
        localization_status: String,
    },
}
