//! # Load Sensing
//!
//! The admission load gate reads ambient host CPU usage. The sensor sits
//! behind a trait so tests can force gate-open/gate-closed conditions
//! without generating real system load.

use parking_lot::Mutex;
use sysinfo::System;

/// Source of the busy-CPU fraction the load gate compares against
/// `cpu_threshold`. Implementations return a value in `[0.0, 1.0]`.
pub trait LoadSensor: Send + Sync {
    fn current_load(&self) -> f64;
}

/// Host-wide CPU usage sampled via sysinfo.
///
/// The very first sample after process start reads 0.0; sysinfo needs two
/// refreshes to compute a usage delta. The constructor performs the priming
/// refresh so the first gate check is already meaningful.
pub struct CpuLoadSensor {
    system: Mutex<System>,
}

impl CpuLoadSensor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for CpuLoadSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSensor for CpuLoadSensor {
    fn current_load(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        f64::from(system.global_cpu_usage()) / 100.0
    }
}

/// Deterministic sensor for tests and fixed-admission deployments
pub struct FixedLoadSensor {
    load: Mutex<f64>,
}

impl FixedLoadSensor {
    pub fn new(load: f64) -> Self {
        Self {
            load: Mutex::new(load),
        }
    }

    /// Change the reported load
    pub fn set(&self, load: f64) {
        *self.load.lock() = load;
    }
}

impl LoadSensor for FixedLoadSensor {
    fn current_load(&self) -> f64 {
        *self.load.lock()
    }
}
