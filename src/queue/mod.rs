//! # Queue Backend
//!
//! The messaging contract any queue adapter must satisfy, the activity
//! message schema at the queue boundary, and an in-process adapter for
//! embedded deployments and tests.
//!
//! Delivery is at-least-once: redelivery and visibility policy belong to the
//! adapter, and the engine makes duplicate delivery safe with the claim CAS
//! in the execution lifecycle.

pub mod errors;
pub mod memory;
pub mod message;

use async_trait::async_trait;

pub use errors::{QueueError, QueueResult};
pub use message::{DeliveredMessage, TaskMessage};

/// Contract required of any messaging adapter
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Idempotent channel provisioning; safe to call repeatedly
    async fn create_channel(&self, channel: &str) -> QueueResult<()>;

    /// Publish an activity message; returns the adapter's message id
    async fn enqueue(&self, channel: &str, message: &TaskMessage) -> QueueResult<i64>;

    /// Pull up to `max_messages` currently available messages. Delivered
    /// messages stay in flight until acknowledged or requeued.
    async fn dequeue(&self, channel: &str, max_messages: usize) -> QueueResult<Vec<DeliveredMessage>>;

    /// Acknowledge a delivered message as handled; it will not be redelivered
    async fn ack(&self, channel: &str, message_id: i64) -> QueueResult<()>;

    /// Return a delivered message to the channel for redelivery
    async fn requeue(&self, channel: &str, message_id: i64) -> QueueResult<()>;
}
