use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of a pre-flight movement safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub ok: bool,
    pub message: String,
}

impl SafetyVerdict {
    pub fn clear() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Consulted before follow/movement commands dispatch. A failed verdict
/// prevents the operation entirely, before any hardware call.
#[async_trait]
pub trait SafetyMonitor: Send + Sync {
    async fn evaluate_movement_safety(&self) -> SafetyVerdict;
}

/// Blocks motion while the charging flap is open; the base must not drive
/// with the flap extended.
pub struct ChargingFlapCheck {
    flap_open: AtomicBool,
}

impl ChargingFlapCheck {
    pub fn new() -> Self {
        Self {
            flap_open: AtomicBool::new(false),
        }
    }

    pub fn set_flap_open(&self, open: bool) {
        self.flap_open.store(open, Ordering::Release);
    }
}

impl Default for ChargingFlapCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SafetyMonitor for ChargingFlapCheck {
    async fn evaluate_movement_safety(&self) -> SafetyVerdict {
        if self.flap_open.load(Ordering::Acquire) {
            SafetyVerdict::blocked("charging flap is open")
        } else {
            SafetyVerdict::clear()
        }
    }
}
