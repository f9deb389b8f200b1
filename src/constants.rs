//! # System Constants
//!
//! Shared names and defaults used across the engine. Message key names are the
//! wire schema at the queue boundary; changing them breaks interop with
//! already-enqueued messages.

/// Default queue channel that activity messages are published on
pub const DEFAULT_CHANNEL: &str = "activity_tasks";

/// Table backing the SQLite task store
pub const TASK_TABLE: &str = "activity_tasks";

/// Field names of the queue message schema
pub mod message_keys {
    pub const PARTITION: &str = "partition";
    pub const ROW_KEY: &str = "row_key";
    pub const ACTIVITY_TYPE: &str = "activity_type";
}

/// Built-in defaults for controller tuning, overridable via configuration
pub mod defaults {
    /// Worker pool size (concurrency gate)
    pub const MAX_WORKERS: usize = 4;

    /// Busy-CPU fraction above which admission stops (load gate)
    pub const CPU_THRESHOLD: f64 = 0.90;

    /// Messages requested per dequeue call
    pub const DEQUEUE_BATCH_SIZE: usize = 10;

    /// Backoff after a failed queue poll
    pub const POLL_INTERVAL_MS: u64 = 250;

    /// Backoff while an admission gate is closed
    pub const GATE_BACKOFF_MS: u64 = 100;

    /// Backoff when the queue yields no work
    pub const IDLE_BACKOFF_MS: u64 = 500;
}
