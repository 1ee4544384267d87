use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use shoot_core::tools::ToolSchema;
use shoot_core::{
    AgentError, Message, Role, RunEvent, RunKind, RunMetrics, RunStatus, TokenUsage, ToolError,
    ToolExecutor, ToolResult,
};
use shoot_llm::{FinishReason, LLMProvider, LLMRequest, LLMResponse, ToolArguments, ToolCallPart};

use crate::config::RunConfig;
use crate::events::EventSink;

/// One execution of an agent or collector, in whatever state it ended.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub agent_id: String,
    pub kind: RunKind,
    pub model: String,
    pub status: RunStatus,
    /// Append-only; preserved for diagnostics whatever the outcome.
    pub transcript: Vec<Message>,
    pub usage: TokenUsage,
    pub model_calls: u32,
    /// The final answer was cut off by the provider's output limit.
    pub truncated: bool,
    pub error: Option<AgentError>,
    pub duration: Duration,
}

impl Run {
    fn start(config: &RunConfig, query: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: config.agent_id.clone(),
            kind: config.kind,
            model: config.model.clone(),
            status: RunStatus::Running,
            transcript: vec![
                Message::system(config.system_prompt.clone()),
                Message::user(query),
            ],
            usage: TokenUsage::default(),
            model_calls: 0,
            truncated: false,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Text of the last assistant turn.
    pub fn final_text(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.as_str())
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn metrics(&self, cost_usd: f64) -> RunMetrics {
        RunMetrics {
            duration_ms: self.duration.as_millis() as u64,
            num_turns: self.model_calls,
            total_cost_usd: cost_usd,
            usage: self.usage,
            status: Some(self.status),
            runs: 1,
        }
    }

    pub fn into_result(self) -> Result<String, AgentError> {
        match self.status {
            RunStatus::Completed => Ok(self.final_text().unwrap_or_default().to_string()),
            _ => Err(self
                .error
                .unwrap_or_else(|| AgentError::Adapter(format!("run ended {}", self.status)))),
        }
    }

    fn fail(&mut self, status: RunStatus, error: AgentError) {
        self.status = status;
        self.error = Some(error);
    }
}

/// Drives one run to a terminal status.
///
/// The transcript starts as the rendered system prompt plus the query. Each
/// iteration checks cancellation and both budgets before calling the model;
/// tool calls in a reply are dispatched concurrently and their results are
/// appended in the order the model issued them.
pub async fn run_agent_loop(
    config: &RunConfig,
    query: &str,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    events: &EventSink,
    cancel: CancellationToken,
) -> Run {
    let debug_logger = DebugLogger::new(log::log_enabled!(log::Level::Debug));
    let started = std::time::Instant::now();
    let mut run = Run::start(config, query);

    log::info!(
        "[{}] Starting {:?} run for '{}' (max {} turns, {}s)",
        run.id,
        config.kind,
        config.agent_id,
        config.max_turns,
        config.remaining().as_secs()
    );
    events
        .emit(RunEvent::Started {
            run_id: run.id.clone(),
            agent: config.agent_id.clone(),
        })
        .await;

    let tool_schemas = tools.list_tools();
    debug_logger.log_event(
        &run.id,
        "tools",
        serde_json::json!(tool_schemas.iter().map(ToolSchema::name).collect::<Vec<_>>()),
    );

    loop {
        if cancel.is_cancelled() {
            run.fail(RunStatus::Failed, AgentError::Cancelled);
            break;
        }
        if config.is_expired() {
            run.fail(RunStatus::TimedOut, timed_out(config, run.model_calls));
            break;
        }
        if run.model_calls >= config.max_turns {
            log::warn!(
                "[{}] '{}' reached its turn limit of {}",
                run.id,
                config.agent_id,
                config.max_turns
            );
            run.transcript.push(Message::system(format!(
                "Turn limit of {} reached; run stopped.",
                config.max_turns
            )));
            run.fail(
                RunStatus::TurnLimitExceeded,
                AgentError::TurnLimitExceeded {
                    agent: config.agent_id.clone(),
                    max_turns: config.max_turns,
                },
            );
            break;
        }

        let mut request =
            LLMRequest::new(&config.model, run.transcript.clone(), tool_schemas.clone());
        request.temperature = config.temperature;
        request.max_output_tokens = config.max_output_tokens;

        let timer = Timer::new("model_call");
        let turn = run.model_calls + 1;
        let response = match call_model(config, &request, llm.as_ref(), &cancel, turn).await {
            Ok(response) => response,
            Err(error) => {
                let status = match error {
                    AgentError::TimedOut { .. } => RunStatus::TimedOut,
                    _ => RunStatus::Failed,
                };
                run.fail(status, error);
                break;
            }
        };
        timer.debug(&run.id);

        run.model_calls += 1;
        run.usage.add(&response.usage);
        run.transcript.push(response.to_message());

        let text = response.text();
        if !text.is_empty() {
            events
                .emit(RunEvent::Text {
                    agent: config.agent_id.clone(),
                    content: text,
                })
                .await;
        }

        if !response.tool_calls.is_empty() {
            let dispatched =
                dispatch_tools(config, &mut run, &response, tools.as_ref(), events, &cancel).await;
            if let Err((status, error)) = dispatched {
                run.fail(status, error);
                break;
            }
            continue;
        }

        match response.finish_reason {
            FinishReason::MaxTokens => {
                log::warn!("[{}] Final answer truncated at the output limit", run.id);
                run.truncated = true;
                run.status = RunStatus::Completed;
            }
            FinishReason::ContentFiltered => {
                run.fail(
                    RunStatus::Failed,
                    AgentError::Adapter("response blocked by the content filter".to_string()),
                );
            }
            _ => run.status = RunStatus::Completed,
        }
        break;
    }

    run.duration = started.elapsed();
    log::info!(
        "[{}] '{}' finished {} after {} model calls in {}ms",
        run.id,
        config.agent_id,
        run.status,
        run.model_calls,
        run.duration.as_millis()
    );
    events
        .emit(RunEvent::RunFinished {
            run_id: run.id.clone(),
            agent: config.agent_id.clone(),
            status: run.status,
            usage: run.usage,
        })
        .await;

    run
}

fn timed_out(config: &RunConfig, turn: u32) -> AgentError {
    AgentError::TimedOut {
        agent: config.agent_id.clone(),
        budget_secs: config.timeout.as_secs(),
        turn,
    }
}

/// Calls the model within the remaining budget, retrying a failed call once
/// with the same request.
async fn call_model(
    config: &RunConfig,
    request: &LLMRequest,
    llm: &dyn LLMProvider,
    cancel: &CancellationToken,
    turn: u32,
) -> Result<LLMResponse, AgentError> {
    let mut attempt = 1;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(config.remaining(), llm.generate(request)) => outcome,
        };

        match outcome {
            Err(_) => return Err(timed_out(config, turn)),
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(error)) if attempt == 1 => {
                log::warn!(
                    "'{}' model call failed on turn {}, retrying once: {}",
                    config.agent_id,
                    turn,
                    error
                );
                attempt += 1;
            }
            Ok(Err(error)) => return Err(AgentError::Adapter(error.to_string())),
        }
    }
}

async fn dispatch_one(
    part: &ToolCallPart,
    tools: &dyn ToolExecutor,
) -> Result<ToolResult, ToolError> {
    if let Some(reason) = part.decode_error() {
        return Err(ToolError::InvalidArguments(reason.to_string()));
    }
    let timer = Timer::new(format!("tool_{}", part.name));
    let result = tools.execute(&part.to_tool_call()).await;
    timer.debug(&part.id);
    result
}

async fn dispatch_tools(
    config: &RunConfig,
    run: &mut Run,
    response: &LLMResponse,
    tools: &dyn ToolExecutor,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<(), (RunStatus, AgentError)> {
    for part in &response.tool_calls {
        let arguments = match &part.arguments {
            ToolArguments::Decoded(map) => Value::Object(map.clone()),
            ToolArguments::Malformed(_) => Value::String(part.raw_arguments.clone()),
        };
        events
            .emit(RunEvent::ToolStart {
                agent: config.agent_id.clone(),
                tool_call_id: part.id.clone(),
                tool_name: part.name.clone(),
                arguments,
            })
            .await;
    }

    let pending = join_all(response.tool_calls.iter().map(|part| dispatch_one(part, tools)));
    let results = tokio::select! {
        _ = cancel.cancelled() => return Err((RunStatus::Failed, AgentError::Cancelled)),
        results = tokio::time::timeout(config.remaining(), pending) => match results {
            Ok(results) => results,
            Err(_) => return Err((RunStatus::TimedOut, timed_out(config, run.model_calls))),
        },
    };

    let mut fatal = None;
    for (part, result) in response.tool_calls.iter().zip(results) {
        match result {
            Ok(result) => {
                run.transcript.push(Message::tool_result(&part.id, &result.result));
                events
                    .emit(RunEvent::ToolComplete {
                        agent: config.agent_id.clone(),
                        tool_call_id: part.id.clone(),
                        result,
                    })
                    .await;
            }
            Err(error) => {
                log::debug!("[{}] {} failed: {}", run.id, part.name, error);
                run.transcript
                    .push(Message::tool_result(&part.id, format!("Error: {error}")));
                events
                    .emit(RunEvent::ToolError {
                        agent: config.agent_id.clone(),
                        tool_call_id: part.id.clone(),
                        error: error.to_string(),
                    })
                    .await;
                if error.is_fatal() && fatal.is_none() {
                    fatal = Some(error);
                }
            }
        }
    }

    match fatal {
        Some(error) => Err((
            RunStatus::Failed,
            AgentError::ToolInvocation(format!("{} (turn {})", error, run.model_calls)),
        )),
        None => Ok(()),
    }
}

struct DebugLogger {
    enabled: bool,
}

impl DebugLogger {
    fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn log_event(&self, run_id: &str, event_type: &str, details: Value) {
        if !self.enabled {
            return;
        }

        log::debug!("[{}] {}: {}", run_id, event_type, details);
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn debug(&self, scope: &str) {
        log::debug!("[{}] {} completed in {}ms", scope, self.name, self.elapsed_ms());
    }
}
