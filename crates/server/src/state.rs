use std::sync::Arc;
use watermarker_core::{Config, JobEngine};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<JobEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<JobEngine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &JobEngine {
        self.engine.as_ref()
    }
}
