//! # Workflow Client
//!
//! Thin facade over the creation saga and store queries. Starting an
//! activity persists the record and enqueues the message as one saga run;
//! querying goes straight to the store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info};

use crate::constants::DEFAULT_CHANNEL;
use crate::models::TaskStatus;
use crate::queue::QueueBackend;
use crate::saga::{SagaFailure, TaskCreationSaga};
use crate::store::{StoreResult, TaskStore};

/// High-level client for starting and querying background activities
pub struct WorkflowClient {
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn QueueBackend>,
    channel: String,
}

impl WorkflowClient {
    /// Client publishing on the default channel
    pub fn new(store: Arc<dyn TaskStore>, queue: Arc<dyn QueueBackend>) -> Self {
        Self::with_channel(store, queue, DEFAULT_CHANNEL)
    }

    pub fn with_channel(
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn QueueBackend>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            channel: channel.into(),
        }
    }

    /// Create a new activity and enqueue its message via the creation saga.
    /// Returns the generated row key; a failed saga has already compensated
    /// any partially created record (or flagged that it could not).
    pub async fn start_activity(
        &self,
        activity_type: &str,
        partition: &str,
        payload: Value,
    ) -> Result<String, SagaFailure> {
        let saga = TaskCreationSaga::new(
            self.store.as_ref(),
            self.queue.as_ref(),
            &self.channel,
            activity_type,
            partition,
            payload,
        );
        match saga.run().await {
            Ok(row_key) => {
                info!(
                    activity_type = %activity_type,
                    partition = %partition,
                    row_key = %row_key,
                    "activity started"
                );
                Ok(row_key)
            }
            Err(failure) => {
                error!(
                    activity_type = %activity_type,
                    partition = %partition,
                    error = %failure,
                    "activity creation failed"
                );
                Err(failure)
            }
        }
    }

    /// Current lifecycle status, or `None` for unknown identifiers
    pub async fn get_status(
        &self,
        row_key: &str,
        partition: &str,
    ) -> StoreResult<Option<TaskStatus>> {
        Ok(self
            .store
            .get(partition, row_key)
            .await?
            .map(|record| record.status))
    }

    /// Deserialized output payload of a completed activity. `None` for
    /// unknown identifiers and for activities not (yet) COMPLETED.
    pub async fn get_result(&self, row_key: &str, partition: &str) -> StoreResult<Option<Value>> {
        let Some(record) = self.store.get(partition, row_key).await? else {
            return Ok(None);
        };
        match (record.status, record.output_payload) {
            (TaskStatus::Completed, Some(payload)) if !payload.is_empty() => {
                Ok(Some(serde_json::from_str(&payload)?))
            }
            _ => Ok(None),
        }
    }

    /// Poll `get_status` until it reaches `target` or `timeout` elapses;
    /// returns the last observed status either way.
    pub async fn wait_for_status(
        &self,
        row_key: &str,
        partition: &str,
        target: TaskStatus,
        timeout: Duration,
    ) -> StoreResult<Option<TaskStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.get_status(row_key, partition).await?;
            if status == Some(target) || Instant::now() >= deadline {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
