//! # Configuration
//!
//! Layered configuration: built-in defaults, an optional `workflow` file
//! (TOML/YAML/JSON, whatever the `config` crate recognizes), then
//! `WORKFLOW__`-prefixed environment variables. Every field has a default so
//! a bare process starts with sane tuning.
//!
//! ```text
//! WORKFLOW__CONTROLLER__MAX_WORKERS=8
//! WORKFLOW__CONTROLLER__CPU_THRESHOLD=0.75
//! WORKFLOW__DATABASE__PATH=/var/lib/workflow/tasks.db
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, DEFAULT_CHANNEL};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Controller/scheduler tuning
    pub controller: ControllerConfig,

    /// Embedded store settings
    pub database: DatabaseConfig,
}

/// Controller and admission-gate tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Worker pool size; the concurrency gate admits while in-flight
    /// executions stay below this
    pub max_workers: usize,

    /// Busy-CPU fraction in `[0.0, 1.0]`; the load gate admits while the
    /// sampled load stays below this
    pub cpu_threshold: f64,

    /// Queue channel the controller polls
    pub channel: String,

    /// Messages requested per dequeue call
    pub dequeue_batch_size: usize,

    /// Backoff after a failed queue poll
    pub poll_interval_ms: u64,

    /// Backoff while an admission gate is closed
    pub gate_backoff_ms: u64,

    /// Backoff when the queue yields no work
    pub idle_backoff_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_workers: defaults::MAX_WORKERS,
            cpu_threshold: defaults::CPU_THRESHOLD,
            channel: DEFAULT_CHANNEL.to_string(),
            dequeue_batch_size: defaults::DEQUEUE_BATCH_SIZE,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            gate_backoff_ms: defaults::GATE_BACKOFF_MS,
            idle_backoff_ms: defaults::IDLE_BACKOFF_MS,
        }
    }
}

/// Embedded SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "workflow_tasks.db".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from the optional `workflow` file and the
    /// environment, on top of the built-in defaults.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name("workflow").required(false))
            .add_source(
                ::config::Environment::with_prefix("WORKFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
