use std::sync::Arc;
use std::time::Duration;

use shoot_config::Configuration;
use shoot_llm::LLMProvider;
use shoot_loop::Investigator;

/// Upper bound for one deep readiness probe of a tool server.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared by every worker. Everything inside is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub investigator: Arc<Investigator>,
    pub probe_timeout: Duration,
}

impl AppState {
    pub fn new(investigator: Investigator) -> Self {
        Self {
            investigator: Arc::new(investigator),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn config(&self) -> &Arc<Configuration> {
        self.investigator.config()
    }

    pub fn llm(&self) -> &Arc<dyn LLMProvider> {
        self.investigator.llm()
    }
}
