//! # Activity Controller
//!
//! Resource-aware scheduling loop. The controller is the single admission
//! authority: it polls the queue, admits work under a concurrency gate (a
//! bounded worker pool) and a load gate (sampled host CPU), dispatches each
//! message to the handler registered for its activity type, and isolates
//! per-message failure from the control loop.
//!
//! Workers share no in-memory mutable task state; everything they coordinate
//! on lives in the store behind its compare-and-swap contract.

pub mod load;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::error::{Result, WorkflowError};
use crate::execution;
use crate::queue::{DeliveredMessage, QueueBackend};
use crate::registry::HandlerRegistry;
use crate::store::TaskStore;

pub use load::{CpuLoadSensor, FixedLoadSensor, LoadSensor};

/// Resource-aware controller that pulls queued activities and runs them
/// through the execution lifecycle on a bounded worker pool.
pub struct ActivityController {
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn QueueBackend>,
    registry: Arc<HandlerRegistry>,
    load_sensor: Arc<dyn LoadSensor>,
    config: ControllerConfig,
    permits: Arc<Semaphore>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl ActivityController {
    pub fn new(
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn QueueBackend>,
        registry: Arc<HandlerRegistry>,
        config: ControllerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_workers));
        Self {
            store,
            queue,
            registry,
            load_sensor: Arc::new(CpuLoadSensor::new()),
            config,
            permits,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Replace the ambient CPU sensor, e.g. with [`FixedLoadSensor`] for
    /// deterministic admission in tests.
    pub fn with_load_sensor(mut self, sensor: Arc<dyn LoadSensor>) -> Self {
        self.load_sensor = sensor;
        self
    }

    /// Idempotent setup of the backing table and queue channel; safe to call
    /// repeatedly.
    pub async fn initialize_infrastructure(&self) -> Result<()> {
        self.store.create_if_not_exists().await?;
        self.queue.create_channel(&self.config.channel).await?;
        info!(channel = %self.config.channel, "🏗️ infrastructure ensured");
        Ok(())
    }

    /// Drain currently available work up to capacity, await the dispatched
    /// executions, and return how many messages were dispatched. Used for
    /// deterministic single-batch processing (tests, cron-style invocations).
    pub async fn run_once(&self) -> Result<usize> {
        let mut executions = JoinSet::new();
        let mut dispatched = 0usize;

        loop {
            let available = self.permits.available_permits();
            if available == 0 {
                break;
            }
            let current_load = self.load_sensor.current_load();
            if current_load >= self.config.cpu_threshold {
                debug!(
                    load = current_load,
                    threshold = self.config.cpu_threshold,
                    "load gate closed"
                );
                break;
            }

            let batch = available.min(self.config.dequeue_batch_size);
            let messages = self.queue.dequeue(&self.config.channel, batch).await?;
            if messages.is_empty() {
                break;
            }

            let mut progressed = 0usize;
            for delivered in messages {
                if self.dispatch(delivered, &mut executions).await {
                    progressed += 1;
                }
            }
            dispatched += progressed;
            // A round that only requeued (e.g. unregistered activity types)
            // must not spin on the same messages.
            if progressed == 0 {
                break;
            }
        }

        self.drain(&mut executions).await;
        Ok(dispatched)
    }

    /// Continuous mode: repeat the poll/admit/dispatch cycle with idle
    /// backoff until [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(WorkflowError::InvalidState(
                "controller is already running".to_string(),
            ));
        }

        info!(
            max_workers = self.config.max_workers,
            cpu_threshold = self.config.cpu_threshold,
            channel = %self.config.channel,
            "🚀 controller started"
        );

        let mut executions = JoinSet::new();

        while self.running.load(Ordering::Acquire) {
            // Reap finished executions; a panic in one must not stop the loop
            while let Some(result) = executions.try_join_next() {
                if let Err(e) = result {
                    error!(error = %e, "execution task aborted");
                }
            }

            if self.permits.available_permits() == 0 {
                debug!("concurrency gate closed, backing off");
                self.sleep_or_shutdown(Duration::from_millis(self.config.gate_backoff_ms))
                    .await;
                continue;
            }

            let current_load = self.load_sensor.current_load();
            if current_load >= self.config.cpu_threshold {
                debug!(
                    load = current_load,
                    threshold = self.config.cpu_threshold,
                    "load gate closed, backing off"
                );
                self.sleep_or_shutdown(Duration::from_millis(self.config.gate_backoff_ms))
                    .await;
                continue;
            }

            let batch = self
                .permits
                .available_permits()
                .min(self.config.dequeue_batch_size);
            match self.queue.dequeue(&self.config.channel, batch).await {
                Ok(messages) if messages.is_empty() => {
                    self.sleep_or_shutdown(Duration::from_millis(self.config.idle_backoff_ms))
                        .await;
                }
                Ok(messages) => {
                    let mut progressed = 0usize;
                    for delivered in messages {
                        if self.dispatch(delivered, &mut executions).await {
                            progressed += 1;
                        }
                    }
                    if progressed == 0 {
                        self.sleep_or_shutdown(Duration::from_millis(self.config.idle_backoff_ms))
                            .await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "queue poll failed, backing off");
                    self.sleep_or_shutdown(Duration::from_millis(self.config.poll_interval_ms))
                        .await;
                }
            }
        }

        self.drain(&mut executions).await;
        info!("controller stopped");
        Ok(())
    }

    /// Request cooperative shutdown of a continuous [`run`](Self::run).
    /// In-flight executions are awaited before `run` returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Executions currently holding a worker slot
    pub fn in_flight(&self) -> usize {
        self.config.max_workers - self.permits.available_permits()
    }

    /// Dispatch one delivery; returns whether an execution was spawned.
    async fn dispatch(&self, delivered: DeliveredMessage, executions: &mut JoinSet<()>) -> bool {
        let message = match delivered.task_message() {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    message_id = delivered.id,
                    error = %e,
                    "malformed queue message, acknowledging and dropping"
                );
                if let Err(ack_err) = self.queue.ack(&self.config.channel, delivered.id).await {
                    warn!(message_id = delivered.id, error = %ack_err, "failed to ack malformed message");
                }
                return false;
            }
        };

        let Some(handler) = self.registry.resolve(&message.activity_type) else {
            warn!(
                activity_type = %message.activity_type,
                row_key = %message.row_key,
                "no handler registered, requeueing message"
            );
            if let Err(e) = self.queue.requeue(&self.config.channel, delivered.id).await {
                error!(message_id = delivered.id, error = %e, "failed to requeue message");
            }
            return false;
        };

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Pool closed; only reachable during teardown
                if let Err(e) = self.queue.requeue(&self.config.channel, delivered.id).await {
                    error!(message_id = delivered.id, error = %e, "failed to requeue message");
                }
                return false;
            }
        };

        let store = Arc::clone(&self.store);
        let queue = Arc::clone(&self.queue);
        let channel = self.config.channel.clone();
        let message_id = delivered.id;
        executions.spawn(async move {
            let outcome =
                execution::execute_single(store.as_ref(), handler.as_ref(), &message).await;
            debug!(
                row_key = %message.row_key,
                outcome = ?outcome,
                "execution finished"
            );
            // COMPLETED, ERROR and skipped duplicates all count as handled;
            // finality is already recorded in the store.
            if let Err(e) = queue.ack(&channel, message_id).await {
                warn!(message_id, error = %e, "failed to acknowledge handled message");
            }
            drop(permit);
        });
        true
    }

    async fn drain(&self, executions: &mut JoinSet<()>) {
        while let Some(result) = executions.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "execution task aborted");
            }
        }
    }

    async fn sleep_or_shutdown(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WorkflowClient;
    use crate::execution::ActivityHandler;
    use crate::models::TaskStatus;
    use crate::queue::memory::InMemoryQueueBackend;
    use crate::store::memory::InMemoryTaskStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    /// Handler that tracks its own peak concurrency
    struct SlowCounter {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowCounter {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ActivityHandler for SlowCounter {
        async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    struct Wiring {
        store: Arc<InMemoryTaskStore>,
        queue: Arc<InMemoryQueueBackend>,
        registry: Arc<HandlerRegistry>,
        client: WorkflowClient,
    }

    fn wire() -> Wiring {
        let store = Arc::new(InMemoryTaskStore::new());
        let queue = Arc::new(InMemoryQueueBackend::new());
        let registry = Arc::new(HandlerRegistry::new());
        let client = WorkflowClient::new(store.clone(), queue.clone());
        Wiring {
            store,
            queue,
            registry,
            client,
        }
    }

    fn controller_config(max_workers: usize) -> ControllerConfig {
        ControllerConfig {
            max_workers,
            idle_backoff_ms: 10,
            gate_backoff_ms: 10,
            poll_interval_ms: 10,
            ..ControllerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_initialize_infrastructure_is_idempotent() {
        let w = wire();
        let controller = ActivityController::new(
            w.store.clone(),
            w.queue.clone(),
            w.registry.clone(),
            controller_config(1),
        );
        controller.initialize_infrastructure().await.unwrap();
        controller.initialize_infrastructure().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_bounds_concurrency() {
        let w = wire();
        let handler = Arc::new(SlowCounter::new());
        w.registry.register("SLOW", handler.clone());

        let controller = ActivityController::new(
            w.store.clone(),
            w.queue.clone(),
            w.registry.clone(),
            controller_config(2),
        )
        .with_load_sensor(Arc::new(FixedLoadSensor::new(0.0)));
        controller.initialize_infrastructure().await.unwrap();

        for i in 0..6 {
            w.client
                .start_activity("SLOW", "res-1", json!({ "i": i }))
                .await
                .unwrap();
        }

        let mut total = 0;
        loop {
            let dispatched = controller.run_once().await.unwrap();
            if dispatched == 0 {
                break;
            }
            total += dispatched;
        }

        assert_eq!(total, 6);
        assert!(
            handler.peak.load(Ordering::SeqCst) <= 2,
            "peak concurrency {} exceeded the worker pool",
            handler.peak.load(Ordering::SeqCst)
        );
        assert_eq!(w.queue.ready_len(crate::constants::DEFAULT_CHANNEL), 0);
        assert_eq!(w.queue.in_flight_len(crate::constants::DEFAULT_CHANNEL), 0);
    }

    #[tokio::test]
    async fn test_load_gate_blocks_dispatch_until_load_drops() {
        let w = wire();
        w.registry.register("SLOW", Arc::new(SlowCounter::new()));

        let sensor = Arc::new(FixedLoadSensor::new(0.95));
        let controller = ActivityController::new(
            w.store.clone(),
            w.queue.clone(),
            w.registry.clone(),
            controller_config(2),
        )
        .with_load_sensor(sensor.clone());
        controller.initialize_infrastructure().await.unwrap();

        let row_key = w
            .client
            .start_activity("SLOW", "res-1", json!({}))
            .await
            .unwrap();

        // Gate closed: nothing is dequeued, nothing transitions
        assert_eq!(controller.run_once().await.unwrap(), 0);
        assert_eq!(
            w.client.get_status(&row_key, "res-1").await.unwrap(),
            Some(TaskStatus::Created)
        );
        assert_eq!(w.queue.ready_len(crate::constants::DEFAULT_CHANNEL), 1);

        // Load drops below the threshold: work flows again
        sensor.set(0.10);
        assert_eq!(controller.run_once().await.unwrap(), 1);
        assert_eq!(
            w.client.get_status(&row_key, "res-1").await.unwrap(),
            Some(TaskStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_unregistered_activity_type_is_requeued() {
        let w = wire();
        let controller = ActivityController::new(
            w.store.clone(),
            w.queue.clone(),
            w.registry.clone(),
            controller_config(2),
        )
        .with_load_sensor(Arc::new(FixedLoadSensor::new(0.0)));
        controller.initialize_infrastructure().await.unwrap();

        let row_key = w
            .client
            .start_activity("NOBODY_HOME", "res-1", json!({}))
            .await
            .unwrap();

        assert_eq!(controller.run_once().await.unwrap(), 0);
        // Message stays available for a later registration
        assert_eq!(w.queue.ready_len(crate::constants::DEFAULT_CHANNEL), 1);
        assert_eq!(
            w.client.get_status(&row_key, "res-1").await.unwrap(),
            Some(TaskStatus::Created)
        );
    }

    #[tokio::test]
    async fn test_continuous_run_processes_and_stops() {
        let w = wire();
        w.registry.register("SLOW", Arc::new(SlowCounter::new()));

        let controller = Arc::new(
            ActivityController::new(
                w.store.clone(),
                w.queue.clone(),
                w.registry.clone(),
                controller_config(2),
            )
            .with_load_sensor(Arc::new(FixedLoadSensor::new(0.0))),
        );
        controller.initialize_infrastructure().await.unwrap();

        let loop_controller = controller.clone();
        let handle = tokio::spawn(async move { loop_controller.run().await });

        let row_key = w
            .client
            .start_activity("SLOW", "res-1", json!({ "x": 1 }))
            .await
            .unwrap();

        let status = w
            .client
            .wait_for_status(
                &row_key,
                "res-1",
                TaskStatus::Completed,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(status, Some(TaskStatus::Completed));

        controller.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("controller did not stop")
            .unwrap()
            .unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_run_rejects_second_start() {
        let w = wire();
        let controller = Arc::new(
            ActivityController::new(
                w.store.clone(),
                w.queue.clone(),
                w.registry.clone(),
                controller_config(1),
            )
            .with_load_sensor(Arc::new(FixedLoadSensor::new(0.0))),
        );

        let loop_controller = controller.clone();
        let handle = tokio::spawn(async move { loop_controller.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));

        controller.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("controller did not stop")
            .unwrap()
            .unwrap();
    }
}
