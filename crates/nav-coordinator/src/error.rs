use thiserror::Error;

pub type Result<T, E = NavError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum NavError {
    #[error("no map is loaded")]
    MapNotLoaded,
    #[error("a map load is already in progress")]
    MapLoadBusy,
    #[error("a localization is already in progress")]
    LocalizationBusy,
    #[error("robot is not localized against a map")]
    NotLocalized,
    #[error("localization cancelled")]
    Cancelled,
    #[error("map store error: {0}")]
    Store(String),
    #[error(transparent)]
    Motion(#[from] motion_control::MotionError),
}
