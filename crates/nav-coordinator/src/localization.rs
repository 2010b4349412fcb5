use crate::{LocalizationStatus, LocalizeAction, MapHandle, MapStore, NavError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Side-effect hooks bracketing the map-load critical section.
///
/// Implemented by the phase machine: entering suppresses gestures, holds
/// autonomous abilities and pauses perception and touch; exiting restores
/// them regardless of outcome, with the success flag driving the status text.
#[async_trait]
pub trait CriticalSectionHooks: Send + Sync {
    async fn enter_critical_section(&self);
    async fn exit_critical_section(&self, success: bool);
}

#[derive(Debug, Clone)]
enum MapState {
    NotLoaded,
    Loading,
    Loaded(MapHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalizeState {
    NotLocalized,
    Localizing,
    Localized,
    Failed,
}

struct LocState {
    map: MapState,
    localize: LocalizeState,
    active: Option<Arc<dyn LocalizeAction>>,
}

/// Tracks whether the robot is localized against a loaded map and owns the
/// map cache and the single in-flight localization action.
pub struct LocalizationCoordinator {
    store: Arc<dyn MapStore>,
    state: Mutex<LocState>,
}

impl LocalizationCoordinator {
    pub fn new(store: Arc<dyn MapStore>) -> Self {
        Self {
            store,
            state: Mutex::new(LocState {
                map: MapState::NotLoaded,
                localize: LocalizeState::NotLocalized,
                active: None,
            }),
        }
    }

    /// Whether a previously built map exists on disk.
    pub fn saved_map_exists(&self) -> bool {
        self.store.saved_map_exists()
    }

    pub async fn is_map_loaded(&self) -> bool {
        matches!(self.state.lock().await.map, MapState::Loaded(_))
    }

    pub async fn is_localization_ready(&self) -> bool {
        self.state.lock().await.localize == LocalizeState::Localized
    }

    /// Derived status; never stored.
    pub async fn status(&self) -> LocalizationStatus {
        let st = self.state.lock().await;
        match (&st.map, st.localize) {
            (MapState::Loaded(_), LocalizeState::Localized) => LocalizationStatus::Localized,
            (MapState::Loaded(_), LocalizeState::Localizing) => LocalizationStatus::Localizing,
            (MapState::Loaded(_), LocalizeState::Failed) => LocalizationStatus::LocalizationFailed,
            (MapState::Loaded(_), LocalizeState::NotLocalized) => {
                LocalizationStatus::MapLoadedNotLocalized
            }
            _ => LocalizationStatus::NoMap,
        }
    }

    /// Drop the cached map and any localization progress.
    pub async fn reset_map_cache(&self) {
        let action = {
            let mut st = self.state.lock().await;
            st.map = MapState::NotLoaded;
            st.localize = LocalizeState::NotLocalized;
            st.active.take()
        };
        if let Some(action) = action {
            action.cancel().await;
        }
        info!("map cache reset");
    }

    /// Load the saved map unless one is already loaded.
    ///
    /// The load runs bracketed by the caller's critical-section hooks; the
    /// exit hook always runs, success or failure.
    pub async fn ensure_map_loaded_if_needed(
        &self,
        hooks: &dyn CriticalSectionHooks,
    ) -> Result<()> {
        {
            let mut st = self.state.lock().await;
            match st.map {
                MapState::Loaded(_) => return Ok(()),
                MapState::Loading => return Err(NavError::MapLoadBusy),
                MapState::NotLoaded => st.map = MapState::Loading,
            }
        }

        hooks.enter_critical_section().await;
        let result = self.store.load_map().await;

        {
            let mut st = self.state.lock().await;
            st.map = match &result {
                Ok(handle) => MapState::Loaded(handle.clone()),
                Err(_) => MapState::NotLoaded,
            };
        }

        hooks.exit_critical_section(result.is_ok()).await;
        match result {
            Ok(handle) => {
                info!(map = %handle.name, "map loaded");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "map load failed");
                Err(e)
            }
        }
    }

    /// Localize against the loaded map unless already localized.
    ///
    /// Any leftover localization action is cancelled before a new one starts;
    /// the SDK does not tolerate two concurrent localize actions. A request
    /// while one is running is rejected busy, not queued.
    pub async fn ensure_localization_if_needed(&self) -> Result<()> {
        let action = {
            let mut st = self.state.lock().await;
            match st.localize {
                LocalizeState::Localized => return Ok(()),
                LocalizeState::Localizing => return Err(NavError::LocalizationBusy),
                LocalizeState::NotLocalized | LocalizeState::Failed => {}
            }
            let handle = match &st.map {
                MapState::Loaded(handle) => handle.clone(),
                _ => return Err(NavError::MapNotLoaded),
            };

            // Hard ordering: cancel the previous action before starting a new
            // one. Keeping the state lock across both steps enforces it.
            if let Some(previous) = st.active.take() {
                debug!("cancelling leftover localization action");
                previous.cancel().await;
            }

            let action = self.store.start_localization(&handle).await?;
            st.localize = LocalizeState::Localizing;
            st.active = Some(action.clone());
            action
        };

        let result = action.wait_localized().await;

        {
            let mut st = self.state.lock().await;
            let still_current = st
                .active
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &action));
            if still_current {
                st.active = None;
                st.localize = match &result {
                    Ok(()) => LocalizeState::Localized,
                    Err(_) => LocalizeState::Failed,
                };
            }
        }

        match &result {
            Ok(()) => info!("robot localized"),
            Err(e) => warn!(error = %e, "localization did not complete"),
        }
        result
    }

    /// Cancel the in-flight localization action, if any.
    pub async fn stop_current_localization(&self) {
        let action = {
            let mut st = self.state.lock().await;
            if st.localize == LocalizeState::Localizing {
                st.localize = LocalizeState::NotLocalized;
            }
            st.active.take()
        };
        if let Some(action) = action {
            action.cancel().await;
            debug!("localization action cancelled");
        }
    }
}
