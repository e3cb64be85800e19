//! Job record repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use vmix_models::{JobId, JobRecord, RecordStatus};

use crate::client::{Filter, SupabaseClient};
use crate::error::StoreResult;

/// Columns changed by a status transition. `None` leaves a column untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lipsync_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RecordUpdate {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            result_url: None,
            lipsync_task_id: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            result_url: Some(result_url.into()),
            ..Self::status(RecordStatus::Completed.as_str())
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::status(RecordStatus::Failed.as_str())
        }
    }

    pub fn with_lipsync_task(mut self, task_id: impl Into<String>) -> Self {
        self.lipsync_task_id = Some(task_id.into());
        self
    }

    fn apply(&self, record: &mut JobRecord) {
        record.status = self.status.clone();
        if let Some(url) = &self.result_url {
            record.result_url = Some(url.clone());
        }
        if let Some(task) = &self.lipsync_task_id {
            record.lipsync_task_id = Some(task.clone());
        }
        if let Some(message) = &self.error_message {
            record.error_message = Some(message.clone());
        }
        record.updated_at = self.updated_at;
    }
}

/// Persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create or replace the record for `record.id`.
    async fn upsert(&self, record: &JobRecord) -> StoreResult<()>;

    /// Apply a status transition. Missing rows are not an error.
    async fn update(&self, id: &JobId, update: &RecordUpdate) -> StoreResult<()>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Reachability check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Job records in the Supabase `jobs` table.
#[derive(Debug, Clone)]
pub struct SupabaseJobStore {
    client: SupabaseClient,
}

impl SupabaseJobStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobStore for SupabaseJobStore {
    async fn upsert(&self, record: &JobRecord) -> StoreResult<()> {
        let _: Vec<serde_json::Value> = self.client.upsert(record).await?;
        info!(job_id = %record.id, status = %record.status, "Upserted job record");
        Ok(())
    }

    async fn update(&self, id: &JobId, update: &RecordUpdate) -> StoreResult<()> {
        let rows: Vec<serde_json::Value> = self
            .client
            .patch(&Filter::eq("id", id.as_str()), update)
            .await?;
        if rows.is_empty() {
            debug!(job_id = %id, "Status update matched no rows");
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        let mut rows: Vec<JobRecord> = self.client.select(&Filter::eq("id", id.as_str())).await?;
        Ok(rows.pop())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client.ping().await
    }
}

/// Process-local store for development setups without Supabase.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    records: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert(&self, record: &JobRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, id: &JobId, update: &RecordUpdate) -> StoreResult<()> {
        if let Some(record) = self.records.write().await.get_mut(id) {
            update.apply(record);
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
