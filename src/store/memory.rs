//! In-memory `Database` for tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::Database;

#[derive(Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn get_setting(
        &self,
        context_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(context_id.to_string(), key.to_string())).cloned())
    }

    async fn set_setting(
        &self,
        context_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        self.rows
            .write()
            .await
            .insert((context_id.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete_setting(&self, context_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .rows
            .write()
            .await
            .remove(&(context_id.to_string(), key.to_string()));
        Ok(removed.is_some())
    }
}
