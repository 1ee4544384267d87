use std::time::Duration;

use tokio::time::Instant;

use shoot_config::{AgentProfile, Budget};
use shoot_core::RunKind;

/// Everything one run needs to know about the agent it executes.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub agent_id: String,
    pub kind: RunKind,
    pub model: String,
    pub system_prompt: String,
    pub max_turns: u32,
    /// The configured wall-clock budget, reported on timeout.
    pub timeout: Duration,
    /// When the run must stop, which may be earlier than `timeout` allows
    /// when a parent run is running out of time.
    pub deadline: Instant,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl RunConfig {
    pub fn new(
        agent_id: impl Into<String>,
        kind: RunKind,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        budget: Budget,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_turns: budget.max_turns,
            timeout: budget.timeout,
            deadline: Instant::now() + budget.timeout,
            temperature: None,
            max_output_tokens: None,
        }
    }

    /// Builds the config for `profile` with its instructions already rendered.
    pub fn for_profile(profile: &AgentProfile, kind: RunKind, system_prompt: String) -> Self {
        Self::new(&profile.id, kind, &profile.model, system_prompt, profile.budget)
    }

    /// Tightens the deadline; a later deadline than the current one is ignored.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = self.deadline.min(deadline);
        self
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
