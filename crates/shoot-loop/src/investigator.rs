use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use shoot_config::model::{INVESTIGATION_TIMEOUT_RANGE, INVESTIGATION_TURNS_RANGE};
use shoot_config::{merge_variables, AgentSpec, Configuration};
use shoot_core::{
    format_response, AgentError, FormattedResponse, InvestigationMetrics, RunEvent, RunKind,
    RunStatus,
};
use shoot_llm::LLMProvider;

use crate::config::RunConfig;
use crate::delegation::{DelegationExecutor, McpProvisioner, ToolProvisioner};
use crate::events::EventSink;
use crate::runner::run_agent_loop;

#[derive(Debug, Clone, Default)]
pub struct InvestigationRequest {
    pub query: String,
    pub agent: Option<String>,
    pub variables: HashMap<String, String>,
    /// Replaces the agent's own timeout, capped at the investigation maximum.
    pub timeout: Option<Duration>,
    /// Replaces the coordinator's turn budget, capped at the investigation maximum.
    pub max_turns: Option<u32>,
    /// Caller-chosen id for correlating logs and events; generated when absent.
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InvestigationOutcome {
    pub request_id: String,
    pub agent: String,
    pub status: RunStatus,
    pub response: FormattedResponse,
    pub truncated: bool,
    pub metrics: InvestigationMetrics,
}

#[derive(Debug, Clone, Error)]
#[error("[{request_id}] {error}")]
pub struct InvestigationError {
    pub request_id: String,
    pub agent: Option<String>,
    pub error: AgentError,
    pub metrics: Option<InvestigationMetrics>,
}

/// Runs one query end to end: the coordinator, its delegations, and the
/// formatting of its final answer.
pub struct Investigator {
    config: Arc<Configuration>,
    llm: Arc<dyn LLMProvider>,
    provisioner: Arc<dyn ToolProvisioner>,
}

impl Investigator {
    pub fn new(config: Arc<Configuration>, llm: Arc<dyn LLMProvider>) -> Self {
        let provisioner = Arc::new(McpProvisioner::new(config.clone()));
        Self::with_provisioner(config, llm, provisioner)
    }

    pub fn with_provisioner(
        config: Arc<Configuration>,
        llm: Arc<dyn LLMProvider>,
        provisioner: Arc<dyn ToolProvisioner>,
    ) -> Self {
        Self {
            config,
            llm,
            provisioner,
        }
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn llm(&self) -> &Arc<dyn LLMProvider> {
        &self.llm
    }

    /// The named agent, or the only one when no name is given.
    pub fn resolve_agent(&self, name: Option<&str>) -> Result<&AgentSpec, AgentError> {
        if let Some(name) = name {
            return self
                .config
                .agent(name)
                .ok_or_else(|| AgentError::AgentNotFound {
                    name: name.to_string(),
                    available: self.config.agent_names(),
                });
        }
        match self.config.agents.values().collect::<Vec<_>>().as_slice() {
            [only] => Ok(*only),
            _ => Err(AgentError::AgentRequired {
                available: self.config.agent_names(),
            }),
        }
    }

    pub async fn investigate(
        &self,
        request: InvestigationRequest,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<InvestigationOutcome, InvestigationError> {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let result = self
            .investigate_inner(&request_id, request, &events, cancel)
            .await;

        match &result {
            Ok(outcome) => {
                events
                    .emit(RunEvent::Finished {
                        request_id: request_id.clone(),
                        agent: outcome.agent.clone(),
                        result: outcome.response.envelope_value(),
                        metrics: outcome.metrics.clone(),
                    })
                    .await;
            }
            Err(failure) => {
                log::warn!("{}", failure);
                events
                    .emit(RunEvent::Error {
                        request_id: request_id.clone(),
                        message: failure.error.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    async fn investigate_inner(
        &self,
        request_id: &str,
        request: InvestigationRequest,
        events: &EventSink,
        cancel: CancellationToken,
    ) -> Result<InvestigationOutcome, InvestigationError> {
        let started = Instant::now();
        let failure = |agent: Option<&str>,
                       error: AgentError,
                       metrics: Option<InvestigationMetrics>| InvestigationError {
            request_id: request_id.to_string(),
            agent: agent.map(str::to_string),
            error,
            metrics,
        };

        let agent = self
            .resolve_agent(request.agent.as_deref())
            .map_err(|e| failure(None, e, None))?;
        let agent_id = agent.id();

        let (variables, ignored) = merge_variables(
            &agent.profile.prompt_variables,
            &agent.request_variables,
            &request.variables,
        );
        if !ignored.is_empty() {
            log::warn!(
                "[{}] Ignoring undeclared variables for '{}': {}",
                request_id,
                agent_id,
                ignored.join(", ")
            );
        }
        let system_prompt = agent.profile.instructions.render(&variables);

        let mut run_config =
            RunConfig::for_profile(&agent.profile, RunKind::Coordinator, system_prompt);
        if let Some(timeout) = request.timeout {
            let timeout = timeout.min(Duration::from_secs(INVESTIGATION_TIMEOUT_RANGE.1));
            run_config.timeout = timeout;
            run_config.deadline = tokio::time::Instant::now() + timeout;
        }
        if let Some(max_turns) = request.max_turns {
            run_config.max_turns = max_turns.clamp(1, INVESTIGATION_TURNS_RANGE.1);
        }

        log::info!(
            "[{}] Investigation by '{}': {}",
            request_id,
            agent_id,
            request.query
        );

        let delegation = Arc::new(DelegationExecutor::new(
            self.config.clone(),
            self.llm.clone(),
            self.provisioner.clone(),
            agent_id,
            agent.collectors.clone(),
            events.clone(),
            cancel.clone(),
            run_config.deadline,
        ));

        let run = run_agent_loop(
            &run_config,
            &request.query,
            self.llm.clone(),
            delegation.clone(),
            events,
            cancel,
        )
        .await;

        let coordinator_cost = self
            .config
            .pricing_for(&run.model)
            .cost(run.usage.prompt_tokens, run.usage.completion_tokens);
        let mut breakdown = delegation.breakdown();
        breakdown.insert(agent_id.to_string(), run.metrics(coordinator_cost));
        let metrics = InvestigationMetrics::from_breakdown(
            started.elapsed().as_millis() as u64,
            run.model_calls,
            breakdown,
        );

        let status = run.status;
        let truncated = run.truncated;
        let text = match run.into_result() {
            Ok(text) => text,
            Err(error) => return Err(failure(Some(agent_id), error, Some(metrics))),
        };

        let response = format_response(&text, self.config.schema_for(agent)).map_err(|e| {
            failure(
                Some(agent_id),
                AgentError::SchemaValidation(e.to_string()),
                Some(metrics.clone()),
            )
        })?;

        Ok(InvestigationOutcome {
            request_id: request_id.to_string(),
            agent: agent_id.to_string(),
            status,
            response,
            truncated,
            metrics,
        })
    }
}
