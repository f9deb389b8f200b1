//! # Queue Error Types
//!
//! Structured error handling for the messaging boundary using thiserror.

use thiserror::Error;

/// Errors surfaced by queue adapters
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("enqueue failed on channel {channel}: {message}")]
    EnqueueFailed { channel: String, message: String },

    #[error("queue backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("message serialization error: {message}")]
    Serialization { message: String },

    #[error("channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("message {message_id} not found on channel {channel}")]
    MessageNotFound { channel: String, message_id: i64 },
}

impl QueueError {
    /// Create an enqueue-failed error
    pub fn enqueue_failed(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnqueueFailed {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a channel-not-found error
    pub fn channel_not_found(channel: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            channel: channel.into(),
        }
    }

    /// Create a message-not-found error
    pub fn message_not_found(channel: impl Into<String>, message_id: i64) -> Self {
        Self::MessageNotFound {
            channel: channel.into(),
            message_id,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
