//! # Store Error Types
//!
//! Structured error handling for task storage using thiserror.

use thiserror::Error;

use crate::models::TaskStatus;

/// Errors surfaced by task store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task already exists: {partition}/{row_key}")]
    AlreadyExists { partition: String, row_key: String },

    #[error("task not found: {partition}/{row_key}")]
    NotFound { partition: String, row_key: String },

    #[error(
        "optimistic concurrency conflict on {partition}/{row_key}: \
         expected status {expected}, found {actual}"
    )]
    OptimisticConcurrency {
        partition: String,
        row_key: String,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("payload serialization error: {message}")]
    Serialization { message: String },

    #[error("store backend error: {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Create an already-exists error
    pub fn already_exists(partition: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            partition: partition.into(),
            row_key: row_key.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(partition: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self::NotFound {
            partition: partition.into(),
            row_key: row_key.into(),
        }
    }

    /// Create an optimistic concurrency conflict error
    pub fn conflict(
        partition: impl Into<String>,
        row_key: impl Into<String>,
        expected: TaskStatus,
        actual: TaskStatus,
    ) -> Self {
        Self::OptimisticConcurrency {
            partition: partition.into(),
            row_key: row_key.into(),
            expected,
            actual,
        }
    }

    /// Create a backend error
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the error is the claim-race signal rather than a real fault
    pub fn is_claim_loss(&self) -> bool {
        matches!(
            self,
            Self::OptimisticConcurrency { .. } | Self::NotFound { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => StoreError::Unavailable {
                message: "connection pool is closed".to_string(),
            },
            sqlx::Error::PoolTimedOut => StoreError::Unavailable {
                message: "connection pool timed out".to_string(),
            },
            other => StoreError::Backend {
                operation: "sqlx".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
