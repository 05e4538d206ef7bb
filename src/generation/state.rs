//! The per-context job cache.
//!
//! Only the `Orchestrator` writes through this interface; the poller and plan
//! views read it and must treat what they see as possibly stale.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::DatabaseError;
use crate::generation::job::GenerationJob;
use crate::store::{Database, settings_keys};

/// Load/save/clear access to the current job of one browser context.
///
/// Last write wins. Two contexts never share a cache, and this is not a
/// synchronization primitive between them.
#[async_trait]
pub trait OrchestratorState: Send + Sync {
    async fn load(&self) -> Result<Option<GenerationJob>, DatabaseError>;

    async fn save(&self, job: &GenerationJob) -> Result<(), DatabaseError>;

    async fn clear(&self) -> Result<(), DatabaseError>;
}

/// Job cache stored as one row of the settings table.
pub struct SettingsJobCache {
    db: Arc<dyn Database>,
    context_id: String,
}

impl SettingsJobCache {
    pub fn new(db: Arc<dyn Database>, context_id: impl Into<String>) -> Self {
        Self {
            db,
            context_id: context_id.into(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}

#[async_trait]
impl OrchestratorState for SettingsJobCache {
    async fn load(&self) -> Result<Option<GenerationJob>, DatabaseError> {
        let Some(value) = self
            .db
            .get_setting(&self.context_id, settings_keys::CURRENT_JOB)
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_value::<GenerationJob>(value) {
            Ok(job) if job.is_consistent() => Ok(Some(job)),
            Ok(job) => {
                warn!(
                    context_id = %self.context_id,
                    job_id = %job.provisional_id,
                    "Ignoring cached job that violates the completion invariant"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(context_id = %self.context_id, "Ignoring unreadable cached job: {e}");
                Ok(None)
            }
        }
    }

    async fn save(&self, job: &GenerationJob) -> Result<(), DatabaseError> {
        let value =
            serde_json::to_value(job).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.db
            .set_setting(&self.context_id, settings_keys::CURRENT_JOB, &value)
            .await
    }

    async fn clear(&self) -> Result<(), DatabaseError> {
        self.db
            .delete_setting(&self.context_id, settings_keys::CURRENT_JOB)
            .await?;
        Ok(())
    }
}
