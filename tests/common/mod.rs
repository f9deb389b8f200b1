//! Shared wiring and sample handlers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use workflow_core::client::WorkflowClient;
use workflow_core::config::ControllerConfig;
use workflow_core::controller::{ActivityController, FixedLoadSensor};
use workflow_core::execution::ActivityHandler;
use workflow_core::queue::memory::InMemoryQueueBackend;
use workflow_core::queue::QueueBackend;
use workflow_core::registry::HandlerRegistry;
use workflow_core::store::TaskStore;

/// Doubles `x` and echoes `y` into a human-readable details string
pub struct MultiplyXBy2 {
    pub calls: AtomicUsize,
}

impl MultiplyXBy2 {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActivityHandler for MultiplyXBy2 {
    async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let x = input["x"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("missing field 'x'"))?;
        let y = input["y"].as_str().unwrap_or_default();
        Ok(json!({
            "answer": x * 2,
            "details": format!("Processed message: {y}"),
        }))
    }
}

/// Doubles `x` and echoes `y` verbatim
pub struct SampleTask;

#[async_trait]
impl ActivityHandler for SampleTask {
    async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
        let x = input["x"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("missing field 'x'"))?;
        Ok(json!({
            "answer": x * 2,
            "echo": input["y"],
        }))
    }
}

/// Always fails, for exercising the ERROR finalization path
pub struct FailingTask;

#[async_trait]
impl ActivityHandler for FailingTask {
    async fn handle_single(&self, _input: Value) -> anyhow::Result<Value> {
        anyhow::bail!("intentional failure for testing")
    }
}

/// A fully wired engine over arbitrary store/queue backends
pub struct TestHarness {
    pub queue: Arc<InMemoryQueueBackend>,
    pub registry: Arc<HandlerRegistry>,
    pub controller: Arc<ActivityController>,
    pub client: WorkflowClient,
}

/// Wire a controller and client over `store` with a deterministic open load
/// gate and fast backoffs.
pub fn harness(store: Arc<dyn TaskStore>, max_workers: usize) -> TestHarness {
    let queue = Arc::new(InMemoryQueueBackend::new());
    let registry = Arc::new(HandlerRegistry::new());
    let config = ControllerConfig {
        max_workers,
        idle_backoff_ms: 10,
        gate_backoff_ms: 10,
        poll_interval_ms: 10,
        ..ControllerConfig::default()
    };
    let controller = Arc::new(
        ActivityController::new(
            store.clone(),
            queue.clone() as Arc<dyn QueueBackend>,
            registry.clone(),
            config,
        )
        .with_load_sensor(Arc::new(FixedLoadSensor::new(0.0))),
    );
    let client = WorkflowClient::new(store, queue.clone());
    TestHarness {
        queue,
        registry,
        controller,
        client,
    }
}
