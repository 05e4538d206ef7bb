//! Backend-agnostic key/value persistence for one browser context.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Settings-style storage keyed by `(context_id, key)`.
///
/// Last write wins. Contexts never see each other's rows, and nothing here
/// synchronizes two contexts.
#[async_trait]
pub trait Database: Send + Sync {
    async fn get_setting(
        &self,
        context_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    async fn set_setting(
        &self,
        context_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Returns whether a row was removed.
    async fn delete_setting(&self, context_id: &str, key: &str) -> Result<bool, DatabaseError>;
}

/// Setting keys.
pub mod settings_keys {
    /// The current generation job (`GenerationJob` JSON).
    pub const CURRENT_JOB: &str = "current_generation_job";
    /// Last computed nutrition targets (`NutritionTargets` JSON).
    pub const NUTRITION_TARGETS: &str = "nutrition_targets";
}
