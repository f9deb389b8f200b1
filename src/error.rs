//! # Crate-Level Error Types
//!
//! Aggregates the subsystem errors (store, queue, saga) into a single error
//! type for controller and bootstrap code paths. Subsystem APIs keep their
//! narrow error types; this wrapper exists so callers that compose several
//! subsystems get one `Result` alias.

use thiserror::Error;

use crate::queue::QueueError;
use crate::saga::SagaFailure;
use crate::store::StoreError;

/// Top-level error type for workflow-core operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Saga(#[from] SagaFailure),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<::config::ConfigError> for WorkflowError {
    fn from(err: ::config::ConfigError) -> Self {
        WorkflowError::Configuration(err.to_string())
    }
}

/// Result type alias for workflow-core operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
