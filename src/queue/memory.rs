//! # In-Process Queue Backend
//!
//! Channel-per-name queues held in process memory. Dequeued messages move to
//! an in-flight set until acknowledged or requeued, which models the
//! at-least-once contract without timers: an unacknowledged message is
//! returned by an explicit `requeue`, not a visibility timeout.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::errors::{QueueError, QueueResult};
use super::message::{DeliveredMessage, TaskMessage};
use super::QueueBackend;

#[derive(Debug, Clone)]
struct QueuedEntry {
    id: i64,
    body: serde_json::Value,
    dequeue_count: u32,
}

#[derive(Debug, Default)]
struct ChannelState {
    next_id: i64,
    ready: VecDeque<QueuedEntry>,
    in_flight: HashMap<i64, QueuedEntry>,
}

/// In-process queue backend
#[derive(Debug, Default)]
pub struct InMemoryQueueBackend {
    channels: Mutex<HashMap<String, ChannelState>>,
}

impl InMemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently available for delivery on `channel`
    pub fn ready_len(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |state| state.ready.len())
    }

    /// Messages delivered but not yet acknowledged on `channel`
    pub fn in_flight_len(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |state| state.in_flight.len())
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueueBackend {
    async fn create_channel(&self, channel: &str) -> QueueResult<()> {
        let mut channels = self.channels.lock();
        channels.entry(channel.to_string()).or_default();
        Ok(())
    }

    async fn enqueue(&self, channel: &str, message: &TaskMessage) -> QueueResult<i64> {
        let body = serde_json::to_value(message)?;
        let mut channels = self.channels.lock();
        let state = channels.entry(channel.to_string()).or_default();
        state.next_id += 1;
        let id = state.next_id;
        state.ready.push_back(QueuedEntry {
            id,
            body,
            dequeue_count: 0,
        });
        debug!(channel = %channel, message_id = id, row_key = %message.row_key, "message enqueued");
        Ok(id)
    }

    async fn dequeue(
        &self,
        channel: &str,
        max_messages: usize,
    ) -> QueueResult<Vec<DeliveredMessage>> {
        let mut channels = self.channels.lock();
        let Some(state) = channels.get_mut(channel) else {
            return Ok(Vec::new());
        };

        let count = max_messages.min(state.ready.len());
        let mut delivered = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(mut entry) = state.ready.pop_front() else {
                break;
            };
            entry.dequeue_count += 1;
            delivered.push(DeliveredMessage {
                id: entry.id,
                body: entry.body.clone(),
                dequeue_count: entry.dequeue_count,
            });
            state.in_flight.insert(entry.id, entry);
        }
        Ok(delivered)
    }

    async fn ack(&self, channel: &str, message_id: i64) -> QueueResult<()> {
        let mut channels = self.channels.lock();
        let state = channels
            .get_mut(channel)
            .ok_or_else(|| QueueError::channel_not_found(channel))?;
        state
            .in_flight
            .remove(&message_id)
            .map(|_| ())
            .ok_or_else(|| QueueError::message_not_found(channel, message_id))
    }

    async fn requeue(&self, channel: &str, message_id: i64) -> QueueResult<()> {
        let mut channels = self.channels.lock();
        let state = channels
            .get_mut(channel)
            .ok_or_else(|| QueueError::channel_not_found(channel))?;
        let entry = state
            .in_flight
            .remove(&message_id)
            .ok_or_else(|| QueueError::message_not_found(channel, message_id))?;
        state.ready.push_back(entry);
        debug!(channel = %channel, message_id, "message requeued");
        Ok(())
    }
}
