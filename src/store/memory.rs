//! # In-Memory Task Store
//!
//! HashMap-backed store adapter. Single-process only; the conditional update
//! runs under the map's write lock, which gives it the same atomicity the
//! contract demands from durable adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::models::{StatusUpdate, TaskRecord, TaskStatus};

use super::errors::{StoreError, StoreResult};
use super::TaskStore;

/// In-process task store keyed by `(partition, row_key)`
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    records: RwLock<HashMap<(String, String), TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, terminal or not
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn key(partition: &str, row_key: &str) -> (String, String) {
        (partition.to_string(), row_key.to_string())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_if_not_exists(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create(&self, record: &TaskRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        let key = Self::key(&record.partition, &record.row_key);
        if records.contains_key(&key) {
            return Err(StoreError::already_exists(
                &record.partition,
                &record.row_key,
            ));
        }
        debug!(
            partition = %record.partition,
            row_key = %record.row_key,
            activity_type = %record.activity_type,
            "task record created"
        );
        records.insert(key, record.clone());
        Ok(())
    }

    async fn get(&self, partition: &str, row_key: &str) -> StoreResult<Option<TaskRecord>> {
        Ok(self
            .records
            .read()
            .get(&Self::key(partition, row_key))
            .cloned())
    }

    async fn update_status(
        &self,
        partition: &str,
        row_key: &str,
        expected: TaskStatus,
        update: StatusUpdate,
    ) -> StoreResult<TaskRecord> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&Self::key(partition, row_key))
            .ok_or_else(|| StoreError::not_found(partition, row_key))?;

        if record.status != expected {
            return Err(StoreError::conflict(
                partition,
                row_key,
                expected,
                record.status,
            ));
        }

        record.apply(&update);
        debug!(
            partition = %partition,
            row_key = %row_key,
            status = %record.status,
            "task status updated"
        );
        Ok(record.clone())
    }

    async fn delete(&self, partition: &str, row_key: &str) -> StoreResult<()> {
        let mut records = self.records.write();
        records
            .remove(&Self::key(partition, row_key))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(partition, row_key))
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
