//! # Workflow Core
//!
//! Backend-agnostic background-job orchestration engine.
//!
//! ## Overview
//!
//! Clients submit named **activities** (units of work identified by a resource
//! partition and a unique row key). The engine durably records each activity's
//! lifecycle in a task store, dispatches it through a message queue, and a
//! controller process pulls queued work and executes registered handlers under
//! explicit concurrency and load limits.
//!
//! ## Architecture
//!
//! - Creation runs as a **saga**: persist the task record, then enqueue the
//!   message, compensating with a delete when the enqueue fails. Storage and
//!   queue backends offer no cross-system transaction, so the saga is what
//!   keeps the durable record and the queued message consistent.
//! - Execution is guarded by a **claim**: a compare-and-swap on the stored
//!   status (CREATED → RUNNING) that exactly one delivery can win, which makes
//!   at-least-once queue delivery safe.
//! - The **controller** is the single admission authority: a bounded worker
//!   pool plus a CPU-load gate decide when queued work is accepted.
//!
//! ## Module Organization
//!
//! - [`models`] - Task record and status state machine
//! - [`store`] - Task store contract and the in-memory / SQLite adapters
//! - [`queue`] - Queue contract, message schema and the in-process adapter
//! - [`saga`] - Create-then-enqueue saga with compensating delete
//! - [`execution`] - Claim / run / finalize lifecycle and the handler trait
//! - [`registry`] - Activity-type to handler registry
//! - [`controller`] - Resource-aware scheduling loop
//! - [`client`] - Workflow facade for starting and querying activities
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use workflow_core::client::WorkflowClient;
//! use workflow_core::controller::ActivityController;
//! use workflow_core::config::ControllerConfig;
//! use workflow_core::execution::ActivityHandler;
//! use workflow_core::queue::memory::InMemoryQueueBackend;
//! use workflow_core::registry::HandlerRegistry;
//! use workflow_core::store::memory::InMemoryTaskStore;
//!
//! struct Doubler;
//!
//! #[async_trait::async_trait]
//! impl ActivityHandler for Doubler {
//!     async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
//!         let x = input["x"].as_i64().unwrap_or(0);
//!         Ok(json!({ "answer": x * 2 }))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryTaskStore::new());
//! let queue = Arc::new(InMemoryQueueBackend::new());
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("DOUBLE", Arc::new(Doubler));
//!
//! let controller = ActivityController::new(
//!     store.clone(),
//!     queue.clone(),
//!     registry,
//!     ControllerConfig::default(),
//! );
//! controller.initialize_infrastructure().await?;
//!
//! let client = WorkflowClient::new(store, queue);
//! let row_key = client
//!     .start_activity("DOUBLE", "customer-42", json!({ "x": 21 }))
//!     .await?;
//!
//! controller.run_once().await?;
//! let result = client.get_result(&row_key, "customer-42").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod queue;
pub mod registry;
pub mod saga;
pub mod store;

pub use client::WorkflowClient;
pub use config::{ControllerConfig, DatabaseConfig, WorkflowConfig};
pub use controller::{ActivityController, CpuLoadSensor, FixedLoadSensor, LoadSensor};
pub use error::{Result, WorkflowError};
pub use execution::{ActivityHandler, ExecutionOutcome};
pub use models::{StatusUpdate, TaskRecord, TaskStatus};
pub use queue::{DeliveredMessage, QueueBackend, QueueError, TaskMessage};
pub use registry::HandlerRegistry;
pub use saga::{SagaFailure, SagaState, TaskCreationSaga};
pub use store::{StoreError, TaskStore};
