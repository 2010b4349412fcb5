use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A loaded map the robot can localize against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapHandle {
    pub id: Uuid,
    pub name: String,
}

/// Storage and localization backend for maps.
#[async_trait]
pub trait MapStore: Send + Sync {
    /// Whether a previously built map exists on disk.
    fn saved_map_exists(&self) -> bool;

    /// Load the saved map. Potentially slow; runs inside the navigation
    /// critical section.
    async fn load_map(&self) -> Result<MapHandle>;

    /// Begin localizing against the given map. The returned action resolves
    /// when the robot is localized and supports cooperative cancellation.
    async fn start_localization(&self, map: &MapHandle) -> Result<Arc<dyn LocalizeAction>>;
}

/// One in-flight localization attempt.
#[async_trait]
pub trait LocalizeAction: Send + Sync {
    async fn wait_localized(&self) -> Result<()>;
    async fn cancel(&self);
}
