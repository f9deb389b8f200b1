//! # Task Store
//!
//! The storage contract every adapter must satisfy, plus the bundled
//! adapters: an in-memory map for tests and embedded use, and a SQLite
//! adapter for single-node durable deployments.
//!
//! The contract's one synchronization primitive is `update_status`, a
//! compare-and-swap on the stored status. It is the sole mechanism that
//! prevents two workers from both claiming the same task; no application
//! level lock exists anywhere else.

pub mod errors;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::models::{StatusUpdate, TaskRecord, TaskStatus};

pub use errors::{StoreError, StoreResult};

/// Contract required of any storage adapter
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Idempotent backing-table setup; safe to call repeatedly
    async fn create_if_not_exists(&self) -> StoreResult<()>;

    /// Persist a fresh record. Fails with [`StoreError::AlreadyExists`] when
    /// the `(partition, row_key)` identity is already present.
    async fn create(&self, record: &TaskRecord) -> StoreResult<()>;

    /// Fetch a record by identity; `None` when absent
    async fn get(&self, partition: &str, row_key: &str) -> StoreResult<Option<TaskRecord>>;

    /// Atomically apply `update` only if the stored status currently equals
    /// `expected`; fails with [`StoreError::OptimisticConcurrency`] otherwise.
    /// Returns the record as persisted after the transition.
    async fn update_status(
        &self,
        partition: &str,
        row_key: &str,
        expected: TaskStatus,
        update: StatusUpdate,
    ) -> StoreResult<TaskRecord>;

    /// Remove a record. Used only by saga compensation, before any worker
    /// has claimed the task.
    async fn delete(&self, partition: &str, row_key: &str) -> StoreResult<()>;

    /// Release backend resources
    async fn close(&self) -> StoreResult<()>;
}
