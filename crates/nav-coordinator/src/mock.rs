//! Mock map store for tests and host-only builds.

use crate::{LocalizeAction, MapHandle, MapStore, NavError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Mock map store with scriptable load/localize outcomes.
pub struct MockMapStore {
    saved_map: AtomicBool,
    load_latency: Duration,
    localize_latency: Mutex<Duration>,
    fail_next_load: Mutex<Option<&'static str>>,
    fail_next_localization: Mutex<Option<&'static str>>,
    loads: AtomicUsize,
    localizations: AtomicUsize,
    cancels: Arc<AtomicUsize>,
}

impl MockMapStore {
    pub fn new() -> Self {
        Self {
            saved_map: AtomicBool::new(true),
            load_latency: Duration::from_millis(1),
            localize_latency: Mutex::new(Duration::from_millis(1)),
            fail_next_load: Mutex::new(None),
            fail_next_localization: Mutex::new(None),
            loads: AtomicUsize::new(0),
            localizations: AtomicUsize::new(0),
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_saved_map(&self, exists: bool) {
        self.saved_map.store(exists, Ordering::Release);
    }

    pub fn set_localize_latency(&self, latency: Duration) {
        if let Ok(mut slot) = self.localize_latency.lock() {
            *slot = latency;
        }
    }

    pub fn fail_next_load(&self, message: &'static str) {
        if let Ok(mut slot) = self.fail_next_load.lock() {
            *slot = Some(message);
        }
    }

    pub fn fail_next_localization(&self, message: &'static str) {
        if let Ok(mut slot) = self.fail_next_localization.lock() {
            *slot = Some(message);
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    pub fn localize_count(&self) -> usize {
        self.localizations.load(Ordering::Acquire)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::Acquire)
    }
}

impl Default for MockMapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapStore for MockMapStore {
    fn saved_map_exists(&self) -> bool {
        self.saved_map.load(Ordering::Acquire)
    }

    async fn load_map(&self) -> Result<MapHandle> {
        self.loads.fetch_add(1, Ordering::AcqRel);
        tokio::time::sleep(self.load_latency).await;
        let planned_failure = self
            .fail_next_load
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(message) = planned_failure {
            return Err(NavError::Store(message.to_string()));
        }
        Ok(MapHandle {
            id: Uuid::new_v4(),
            name: "mock-map".to_string(),
        })
    }

    async fn start_localization(
        &self,
        _map: &MapHandle,
    ) -> Result<Arc<dyn LocalizeAction>> {
        self.localizations.fetch_add(1, Ordering::AcqRel);
        let latency = self
            .localize_latency
            .lock()
            .map(|l| *l)
            .unwrap_or(Duration::from_millis(1));
        let failure = self
            .fail_next_localization
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        Ok(Arc::new(MockLocalizeAction {
            latency,
            failure,
            cancel: CancellationToken::new(),
            cancels: self.cancels.clone(),
        }))
    }
}

/// Mock localization attempt resolving after a configured latency.
pub struct MockLocalizeAction {
    latency: Duration,
    failure: Option<&'static str>,
    cancel: CancellationToken,
    cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl LocalizeAction for MockLocalizeAction {
    async fn wait_localized(&self) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NavError::Cancelled),
            _ = tokio::time::sleep(self.latency) => match self.failure {
                Some(message) => Err(NavError::Store(message.to_string())),
                None => Ok(()),
            },
        }
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::AcqRel);
        self.cancel.cancel();
    }
}
