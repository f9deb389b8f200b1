//! # Task Execution Lifecycle
//!
//! Per-delivery claim → run → finalize transitions. The claim is a
//! compare-and-swap on the stored status (CREATED → RUNNING): with
//! at-least-once delivery the same message can arrive twice, and only the
//! delivery that wins the CAS proceeds. Handler failures are absorbed into
//! the ERROR status and never propagate past this module.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::models::{StatusUpdate, TaskRecord, TaskStatus};
use crate::queue::TaskMessage;
use crate::store::{StoreError, TaskStore};

/// Business-logic extension point.
///
/// Handlers receive the deserialized input payload and return the output
/// payload; claiming and finalization stay the lifecycle's job. Errors are
/// opaque (`anyhow`) because the engine only records them, it never branches
/// on them.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Process one message payload
    async fn handle_single(&self, input: Value) -> anyhow::Result<Value>;

    /// Process a batch of payloads; the default maps `handle_single` over
    /// the batch and fails the whole batch on the first error.
    async fn handle_batch(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(self.handle_single(input).await?);
        }
        Ok(outputs)
    }
}

/// How one delivery ended, for controller accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Claim won, handler succeeded, record finalized COMPLETED
    Completed,
    /// Claim won, handler or payload failed, record finalized ERROR
    Failed,
    /// Claim lost (duplicate delivery, record missing, or store fault);
    /// no side effects from this delivery
    Skipped,
}

/// Execute one delivered message through the full lifecycle.
///
/// Never returns an error: every failure mode is either absorbed into the
/// record's ERROR status or reported as [`ExecutionOutcome::Skipped`]. The
/// delivery counts as handled from the queue's perspective either way.
pub async fn execute_single(
    store: &dyn TaskStore,
    handler: &dyn ActivityHandler,
    message: &TaskMessage,
) -> ExecutionOutcome {
    let record = match claim(store, message).await {
        Some(record) => record,
        None => return ExecutionOutcome::Skipped,
    };

    match run_handler(handler, &record).await {
        Ok(output) => finalize_success(store, message, output).await,
        Err(failure) => finalize_failure(store, message, &failure).await,
    }
}

/// Execute a batch of delivered messages through one `handle_batch` call.
///
/// Each message is claimed individually; deliveries that lose the claim are
/// skipped and excluded from the batch. A batch-level handler error fails
/// every claimed record.
pub async fn execute_batch(
    store: &dyn TaskStore,
    handler: &dyn ActivityHandler,
    messages: &[TaskMessage],
) -> Vec<ExecutionOutcome> {
    let mut outcomes = vec![ExecutionOutcome::Skipped; messages.len()];
    let mut claimed: Vec<(usize, Value)> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        let Some(record) = claim(store, message).await else {
            continue;
        };
        match serde_json::from_str::<Value>(&record.input_payload) {
            Ok(input) => claimed.push((index, input)),
            Err(e) => {
                outcomes[index] =
                    finalize_failure(store, message, &format!("invalid input payload: {e}")).await;
            }
        }
    }

    if claimed.is_empty() {
        return outcomes;
    }

    let inputs: Vec<Value> = claimed.iter().map(|(_, input)| input.clone()).collect();
    match handler.handle_batch(inputs).await {
        Ok(outputs) if outputs.len() == claimed.len() => {
            for ((index, _), output) in claimed.into_iter().zip(outputs) {
                outcomes[index] =
                    finalize_success(store, &messages[index], output.to_string()).await;
            }
        }
        Ok(outputs) => {
            let failure = format!(
                "batch handler returned {} outputs for {} inputs",
                outputs.len(),
                claimed.len()
            );
            for (index, _) in claimed {
                outcomes[index] = finalize_failure(store, &messages[index], &failure).await;
            }
        }
        Err(e) => {
            let failure = e.to_string();
            for (index, _) in claimed {
                outcomes[index] = finalize_failure(store, &messages[index], &failure).await;
            }
        }
    }

    outcomes
}

/// Win the CREATED → RUNNING transition or bow out.
async fn claim(store: &dyn TaskStore, message: &TaskMessage) -> Option<TaskRecord> {
    match store
        .update_status(
            &message.partition,
            &message.row_key,
            TaskStatus::Created,
            StatusUpdate::claim(Utc::now()),
        )
        .await
    {
        Ok(record) => Some(record),
        Err(e) if e.is_claim_loss() => {
            debug!(
                partition = %message.partition,
                row_key = %message.row_key,
                reason = %e,
                "claim lost, skipping delivery"
            );
            None
        }
        Err(e) => {
            warn!(
                partition = %message.partition,
                row_key = %message.row_key,
                error = %e,
                "claim aborted on store fault, skipping delivery"
            );
            None
        }
    }
}

async fn run_handler(
    handler: &dyn ActivityHandler,
    record: &TaskRecord,
) -> Result<String, String> {
    let input: Value = serde_json::from_str(&record.input_payload)
        .map_err(|e| format!("invalid input payload: {e}"))?;
    let output = handler
        .handle_single(input)
        .await
        .map_err(|e| e.to_string())?;
    Ok(output.to_string())
}

async fn finalize_success(
    store: &dyn TaskStore,
    message: &TaskMessage,
    output_payload: String,
) -> ExecutionOutcome {
    match store
        .update_status(
            &message.partition,
            &message.row_key,
            TaskStatus::Running,
            StatusUpdate::complete(output_payload, Utc::now()),
        )
        .await
    {
        Ok(_) => {
            debug!(
                partition = %message.partition,
                row_key = %message.row_key,
                "task completed"
            );
            ExecutionOutcome::Completed
        }
        Err(e) => {
            log_finalize_fault(message, &e);
            ExecutionOutcome::Failed
        }
    }
}

async fn finalize_failure(
    store: &dyn TaskStore,
    message: &TaskMessage,
    failure: &str,
) -> ExecutionOutcome {
    error!(
        partition = %message.partition,
        row_key = %message.row_key,
        error = %failure,
        "task execution failed"
    );
    if let Err(e) = store
        .update_status(
            &message.partition,
            &message.row_key,
            TaskStatus::Running,
            StatusUpdate::fail(failure, Utc::now()),
        )
        .await
    {
        log_finalize_fault(message, &e);
    }
    ExecutionOutcome::Failed
}

fn log_finalize_fault(message: &TaskMessage, err: &StoreError) {
    error!(
        partition = %message.partition,
        row_key = %message.row_key,
        error = %err,
        "failed to finalize task status"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryTaskStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DoubleX;

    #[async_trait]
    impl ActivityHandler for DoubleX {
        async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
            let x = input["x"]
                .as_i64()
                .ok_or_else(|| anyhow::anyhow!("missing field 'x'"))?;
            Ok(json!({ "answer": x * 2 }))
        }
    }

    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActivityHandler for CountingHandler {
        async fn handle_single(&self, input: Value) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    async fn seed(store: &InMemoryTaskStore, row_key: &str, payload: &str) -> TaskMessage {
        let record = TaskRecord::new("res-1", row_key, "DOUBLE_X", payload);
        store.create(&record).await.unwrap();
        TaskMessage::for_record(&record)
    }

    #[tokio::test]
    async fn test_successful_execution_completes_record() {
        let store = InMemoryTaskStore::new();
        let message = seed(&store, "key-1", "{\"x\":10}").await;

        let outcome = execute_single(&store, &DoubleX, &message).await;
        assert_eq!(outcome, ExecutionOutcome::Completed);

        let record = store.get("res-1", "key-1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        let output: Value = serde_json::from_str(record.output_payload.as_deref().unwrap()).unwrap();
        assert_eq!(output["answer"], 20);
        assert!(record.started_at.is_some());
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_handler_error_finalizes_error_status() {
        let store = InMemoryTaskStore::new();
        let message = seed(&store, "key-1", "{\"y\":\"no x here\"}").await;

        let outcome = execute_single(&store, &DoubleX, &message).await;
        assert_eq!(outcome, ExecutionOutcome::Failed);

        let record = store.get("res-1", "key-1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("missing field 'x'"));
        assert!(record.output_payload.is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_finalizes_error_status() {
        let store = InMemoryTaskStore::new();
        let message = seed(&store, "key-1", "not json at all").await;

        let outcome = execute_single(&store, &DoubleX, &message).await;
        assert_eq!(outcome, ExecutionOutcome::Failed);

        let record = store.get("res-1", "key-1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("invalid input payload"));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_executes_once() {
        let store = InMemoryTaskStore::new();
        let message = seed(&store, "key-1", "{\"x\":1}").await;
        let handler = CountingHandler {
            calls: AtomicUsize::new(0),
        };

        let first = execute_single(&store, &handler, &message).await;
        let second = execute_single(&store, &handler, &message).await;

        assert_eq!(first, ExecutionOutcome::Completed);
        assert_eq!(second, ExecutionOutcome::Skipped);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_record_is_skipped() {
        let store = InMemoryTaskStore::new();
        let message = TaskMessage::new("res-1", "ghost", "DOUBLE_X");
        let outcome = execute_single(&store, &DoubleX, &message).await;
        assert_eq!(outcome, ExecutionOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_batch_execution_finalizes_each_record() {
        let store = InMemoryTaskStore::new();
        let m1 = seed(&store, "key-1", "{\"x\":1}").await;
        let m2 = seed(&store, "key-2", "{\"x\":2}").await;

        let outcomes = execute_batch(&store, &DoubleX, &[m1, m2]).await;
        assert_eq!(
            outcomes,
            vec![ExecutionOutcome::Completed, ExecutionOutcome::Completed]
        );

        let r1 = store.get("res-1", "key-1").await.unwrap().unwrap();
        let r2 = store.get("res-1", "key-2").await.unwrap().unwrap();
        assert_eq!(r1.status, TaskStatus::Completed);
        assert_eq!(r2.status, TaskStatus::Completed);
        let out2: Value = serde_json::from_str(r2.output_payload.as_deref().unwrap()).unwrap();
        assert_eq!(out2["answer"], 4);
    }

    #[tokio::test]
    async fn test_batch_error_fails_all_claimed() {
        let store = InMemoryTaskStore::new();
        let m1 = seed(&store, "key-1", "{\"x\":1}").await;
        // Missing 'x' makes the default handle_batch fail on this input
        let m2 = seed(&store, "key-2", "{}").await;

        let outcomes = execute_batch(&store, &DoubleX, &[m1, m2]).await;
        assert_eq!(
            outcomes,
            vec![ExecutionOutcome::Failed, ExecutionOutcome::Failed]
        );

        let r1 = store.get("res-1", "key-1").await.unwrap().unwrap();
        assert_eq!(r1.status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn test_batch_skips_already_claimed() {
        let store = InMemoryTaskStore::new();
        let m1 = seed(&store, "key-1", "{\"x\":1}").await;
        let m2 = seed(&store, "key-2", "{\"x\":2}").await;

        // Another worker already claimed key-1
        store
            .update_status(
                "res-1",
                "key-1",
                TaskStatus::Created,
                StatusUpdate::claim(Utc::now()),
            )
            .await
            .unwrap();

        let outcomes = execute_batch(&store, &DoubleX, &[m1, m2]).await;
        assert_eq!(
            outcomes,
            vec![ExecutionOutcome::Skipped, ExecutionOutcome::Completed]
        );
    }
}
