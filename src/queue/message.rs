//! # Queue Message Schema
//!
//! The activity message carried across the queue boundary, plus the delivery
//! wrapper that adapters hand back with their transport metadata.

use serde::{Deserialize, Serialize};

use crate::models::TaskRecord;

use super::errors::QueueResult;

/// Activity message published by the creation saga.
///
/// Wire schema: `{partition, row_key, activity_type}` as JSON. Transport
/// metadata (delivery id, dequeue count, visibility) is adapter-owned and
/// never part of this payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub partition: String,
    pub row_key: String,
    pub activity_type: String,
}

impl TaskMessage {
    pub fn new(
        partition: impl Into<String>,
        row_key: impl Into<String>,
        activity_type: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            row_key: row_key.into(),
            activity_type: activity_type.into(),
        }
    }

    /// Build the message referencing an already-persisted record
    pub fn for_record(record: &TaskRecord) -> Self {
        Self {
            partition: record.partition.clone(),
            row_key: record.row_key.clone(),
            activity_type: record.activity_type.clone(),
        }
    }
}

/// One dequeued message with adapter transport metadata
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    /// Adapter-assigned message id, used for ack/requeue
    pub id: i64,
    /// Raw JSON body as enqueued
    pub body: serde_json::Value,
    /// How many times this message has been delivered (1 on first delivery)
    pub dequeue_count: u32,
}

impl DeliveredMessage {
    /// Decode the body into the activity message schema
    pub fn task_message(&self) -> QueueResult<TaskMessage> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}
