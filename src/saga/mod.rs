//! # Task Creation Saga
//!
//! Creation must leave the durable record and the queued message consistent,
//! but the store and the queue share no transaction. The saga persists the
//! record first, then enqueues, and compensates the record with a delete when
//! the enqueue fails. The one partial-failure outcome it cannot repair (a
//! failed compensating delete) is surfaced explicitly as
//! `compensated: false`, never swallowed.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::TaskRecord;
use crate::queue::{QueueBackend, QueueError, TaskMessage};
use crate::store::{StoreError, TaskStore};

/// Progress states of one saga run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    /// The record was persisted; the message was not yet enqueued
    StoreCreated,
    /// Record persisted and message enqueued; the saga succeeded
    Enqueued,
    /// Enqueue failed and the compensating delete removed the record
    Compensated,
    /// The saga failed and left no consistent outcome: either the initial
    /// create failed, or the compensating delete did (orphan-record risk)
    Failed,
}

/// Failure raised to the caller when creation does not complete
#[derive(Debug, Error)]
#[error("task creation saga failed in state {state:?} (compensated: {compensated}): {source}")]
pub struct SagaFailure {
    #[source]
    pub source: SagaErrorSource,
    /// Whether the compensating delete ran and succeeded
    pub compensated: bool,
    /// Saga state at the point of failure
    pub state: SagaState,
}

/// The subsystem error a saga failure wraps
#[derive(Debug, Error)]
pub enum SagaErrorSource {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl SagaFailure {
    fn store(err: StoreError) -> Self {
        Self {
            source: SagaErrorSource::Store(err),
            compensated: false,
            state: SagaState::Failed,
        }
    }
}

/// One create-then-enqueue protocol run.
///
/// The saga generates the row key, so a failed run never leaves the caller
/// holding an identifier for a record that does not exist.
pub struct TaskCreationSaga<'a> {
    store: &'a dyn TaskStore,
    queue: &'a dyn QueueBackend,
    channel: &'a str,
    activity_type: String,
    partition: String,
    payload: Value,
}

impl<'a> TaskCreationSaga<'a> {
    pub fn new(
        store: &'a dyn TaskStore,
        queue: &'a dyn QueueBackend,
        channel: &'a str,
        activity_type: impl Into<String>,
        partition: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            store,
            queue,
            channel,
            activity_type: activity_type.into(),
            partition: partition.into(),
            payload,
        }
    }

    /// Run the saga; returns the generated row key on success.
    pub async fn run(self) -> Result<String, SagaFailure> {
        let row_key = Uuid::new_v4().to_string();

        let input_payload =
            serde_json::to_string(&self.payload).map_err(|e| SagaFailure::store(e.into()))?;
        let record = TaskRecord::new(
            self.partition.clone(),
            row_key.clone(),
            self.activity_type.clone(),
            input_payload,
        );

        // Step 1: persist. Nothing to compensate when this fails.
        self.store
            .create(&record)
            .await
            .map_err(SagaFailure::store)?;
        debug!(
            partition = %self.partition,
            row_key = %row_key,
            state = ?SagaState::StoreCreated,
            "saga: task record persisted"
        );

        // Step 2: enqueue, compensating the record on failure.
        let message = TaskMessage::for_record(&record);
        match self.queue.enqueue(self.channel, &message).await {
            Ok(message_id) => {
                info!(
                    partition = %self.partition,
                    row_key = %row_key,
                    activity_type = %self.activity_type,
                    message_id,
                    "saga: activity created and enqueued"
                );
                Ok(row_key)
            }
            Err(queue_err) => self.compensate(&row_key, queue_err).await,
        }
    }

    async fn compensate(
        &self,
        row_key: &str,
        queue_err: QueueError,
    ) -> Result<String, SagaFailure> {
        warn!(
            partition = %self.partition,
            row_key = %row_key,
            error = %queue_err,
            "saga: enqueue failed, compensating created record"
        );
        match self.store.delete(&self.partition, row_key).await {
            Ok(()) => Err(SagaFailure {
                source: SagaErrorSource::Queue(queue_err),
                compensated: true,
                state: SagaState::Compensated,
            }),
            Err(delete_err) => {
                // The record now exists with no message behind it. This is
                // the detectable orphan case operators must see.
                error!(
                    partition = %self.partition,
                    row_key = %row_key,
                    enqueue_error = %queue_err,
                    delete_error = %delete_err,
                    "saga: compensating delete failed, orphaned CREATED record remains"
                );
                Err(SagaFailure {
                    source: SagaErrorSource::Queue(queue_err),
                    compensated: false,
                    state: SagaState::Failed,
                })
            }
        }
    }
}
