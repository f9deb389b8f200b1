//! # Task Record
//!
//! Durable representation of one activity's lifecycle, one record per
//! `(partition, row_key)`. Records are created by the saga, claimed and
//! finalized by exactly one worker, and deleted only by saga compensation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

/// One activity's durable lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Resource partition the task is grouped under
    pub partition: String,
    /// Unique identifier of the task within its partition
    pub row_key: String,
    /// Selects the registered handler at dispatch time
    pub activity_type: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Serialized JSON input, set at creation, immutable thereafter
    pub input_payload: String,
    /// Serialized JSON output, set only when the task completes
    pub output_payload: Option<String>,
    /// Failure description, set only when the task errors
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the claim (CREATED → RUNNING) succeeds
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Build a fresh CREATED record for the saga to persist
    pub fn new(
        partition: impl Into<String>,
        row_key: impl Into<String>,
        activity_type: impl Into<String>,
        input_payload: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            row_key: row_key.into(),
            activity_type: activity_type.into(),
            status: TaskStatus::Created,
            input_payload: input_payload.into(),
            output_payload: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a status update in place. The caller is responsible for having
    /// checked the expected-status precondition; adapters use this after a
    /// successful compare-and-swap.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.new_status;
        if update.started_at.is_some() {
            self.started_at = update.started_at;
        }
        if update.output_payload.is_some() {
            self.output_payload = update.output_payload.clone();
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message.clone();
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
    }
}

/// Field set applied atomically with a status transition.
///
/// This is the `fields` argument of the store contract's
/// `update_status(expected, new, fields)` operation. The three constructors
/// cover the only transitions the state machine allows.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub new_status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub output_payload: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// CREATED → RUNNING: the claim that grants exclusive execution rights
    pub fn claim(now: DateTime<Utc>) -> Self {
        Self {
            new_status: TaskStatus::Running,
            started_at: Some(now),
            output_payload: None,
            error_message: None,
            completed_at: None,
        }
    }

    /// RUNNING → COMPLETED with the handler's output payload
    pub fn complete(output_payload: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            new_status: TaskStatus::Completed,
            started_at: None,
            output_payload: Some(output_payload.into()),
            error_message: None,
            completed_at: Some(now),
        }
    }

    /// RUNNING → ERROR with the captured failure description
    pub fn fail(error_message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            new_status: TaskStatus::Error,
            started_at: None,
            output_payload: None,
            error_message: Some(error_message.into()),
            completed_at: Some(now),
        }
    }
}
