use crate::{AbilityHolder, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Acquires and releases the hardware hold that suppresses autonomous
/// background motion (head tracking, idle shifting) around precision
/// operations.
///
/// At most one live hold exists at a time. `ensure_held` is idempotent, and
/// concurrent callers serialize so only one hardware acquisition is issued.
/// `release` is a no-op when nothing is held.
pub struct AutonomousAbilityGuard {
    holder: Arc<dyn AbilityHolder>,
    // Lock is held across the hardware await so a second caller observes the
    // final held state instead of racing a duplicate acquisition.
    held: Mutex<bool>,
}

impl AutonomousAbilityGuard {
    pub fn new(holder: Arc<dyn AbilityHolder>) -> Self {
        Self {
            holder,
            held: Mutex::new(false),
        }
    }

    /// Acquire the hold if it is not already held.
    ///
    /// Callers must not start movement until this resolves successfully.
    pub async fn ensure_held(&self) -> Result<()> {
        let mut held = self.held.lock().await;
        if *held {
            debug!("abilities already held");
            return Ok(());
        }
        self.holder.hold().await?;
        *held = true;
        debug!("autonomous abilities held");
        Ok(())
    }

    /// Release the hold. Safe to call when not held.
    pub async fn release(&self) {
        let mut held = self.held.lock().await;
        if !*held {
            return;
        }
        // Clear our state first so a failed hardware release cannot wedge the
        // guard in a permanently-held position.
        *held = false;
        if let Err(e) = self.holder.release().await {
            warn!(error = %e, "failed to release autonomous abilities");
        } else {
            debug!("autonomous abilities released");
        }
    }

    pub async fn is_held(&self) -> bool {
        *self.held.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAbilityHolder;

    #[tokio::test]
    async fn ensure_held_is_idempotent() {
        let holder = Arc::new(MockAbilityHolder::new());
        let guard = AutonomousAbilityGuard::new(holder.clone());

        guard.ensure_held().await.unwrap();
        guard.ensure_held().await.unwrap();

        assert_eq!(holder.hold_count(), 1);
        assert!(guard.is_held().await);
    }

    #[tokio::test]
    async fn concurrent_ensure_held_acquires_once() {
        let holder = Arc::new(MockAbilityHolder::with_latency(
            std::time::Duration::from_millis(50),
        ));
        let guard = Arc::new(AutonomousAbilityGuard::new(holder.clone()));

        let a = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.ensure_held().await })
        };
        let b = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.ensure_held().await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(holder.hold_count(), 1, "exactly one hardware hold request");
    }

    #[tokio::test]
    async fn release_without_hold_is_noop() {
        let holder = Arc::new(MockAbilityHolder::new());
        let guard = AutonomousAbilityGuard::new(holder.clone());

        guard.release().await;
        assert_eq!(holder.release_count(), 0);
    }

    #[tokio::test]
    async fn release_after_hold_releases_once() {
        let holder = Arc::new(MockAbilityHolder::new());
        let guard = AutonomousAbilityGuard::new(holder.clone());

        guard.ensure_held().await.unwrap();
        guard.release().await;
        guard.release().await;

        assert_eq!(holder.release_count(), 1);
        assert!(!guard.is_held().await);
    }

    #[tokio::test]
    async fn failed_hold_leaves_guard_unheld() {
        let holder = Arc::new(MockAbilityHolder::new());
        holder.fail_holds_with("actuation refused");
        let guard = AutonomousAbilityGuard::new(holder.clone());

        assert!(guard.ensure_held().await.is_err());
        assert!(!guard.is_held().await);

        // A retry after the transient failure acquires normally.
        holder.clear_hold_failure();
        guard.ensure_held().await.unwrap();
        assert!(guard.is_held().await);
    }
}
