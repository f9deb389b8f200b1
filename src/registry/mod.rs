//! # Handler Registry
//!
//! Explicit activity-type to handler mapping, populated by an initialization
//! call rather than import-time side effects, so dispatch never depends on
//! module load order.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::execution::ActivityHandler;

/// Thread-safe registry mapping activity types to handler instances
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn ActivityHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `activity_type`. The last registration wins;
    /// replacing an existing handler is logged since it usually signals a
    /// wiring mistake.
    pub fn register(&self, activity_type: impl Into<String>, handler: Arc<dyn ActivityHandler>) {
        let activity_type = activity_type.into();
        if self.handlers.insert(activity_type.clone(), handler).is_some() {
            warn!(activity_type = %activity_type, "replaced existing handler registration");
        } else {
            info!(activity_type = %activity_type, "handler registered");
        }
    }

    /// Resolve the handler for an activity type
    pub fn resolve(&self, activity_type: &str) -> Option<Arc<dyn ActivityHandler>> {
        self.handlers
            .get(activity_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Activity types with a registered handler
    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}
