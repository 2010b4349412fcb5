//! Mock perception tracker for tests.

use crate::{HumanTarget, HumanTracker, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock tracker reporting a settable sticky target.
pub struct MockHumanTracker {
    target: Mutex<Option<HumanTarget>>,
    locates: AtomicUsize,
}

impl MockHumanTracker {
    pub fn new() -> Self {
        Self {
            target: Mutex::new(None),
            locates: AtomicUsize::new(0),
        }
    }

    pub fn set_target(&self, target: HumanTarget) {
        if let Ok(mut slot) = self.target.lock() {
            *slot = Some(target);
        }
    }

    pub fn clear_target(&self) {
        if let Ok(mut slot) = self.target.lock() {
            *slot = None;
        }
    }

    pub fn locate_count(&self) -> usize {
        self.locates.load(Ordering::Acquire)
    }
}

impl Default for MockHumanTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanTracker for MockHumanTracker {
    async fn locate_target(&self) -> Result<Option<HumanTarget>> {
        self.locates.fetch_add(1, Ordering::AcqRel);
        Ok(self.target.lock().map(|t| *t).unwrap_or(None))
    }
}
