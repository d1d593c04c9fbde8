//! Application state for the HTTP server.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::OptimizerConfig;
use crate::services::RunTracker;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration. The drive-time token can change at runtime.
    pub config: Arc<RwLock<OptimizerConfig>>,
    pub run_tracker: RunTracker,
}

impl AppState {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            run_tracker: RunTracker::new(),
        }
    }

    /// Copy of the current configuration for one request.
    pub fn config_snapshot(&self) -> OptimizerConfig {
        self.config.read().clone()
    }
}
