//! Agent-calls-agent as a tool.
//!
//! A coordinator sees one tool per collector it may delegate to, taking a
//! single `query` string. Calling it runs the collector as its own nested
//! run with its own tool servers, and hands the collector's answer (or a
//! JSON error summary) back as the tool result.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use shoot_config::{CollectorSpec, Configuration, ToolServerSpec};
use shoot_core::tools::Result;
use shoot_core::{
    parse_tool_args, AgentError, RunEvent, RunKind, RunMetrics, RunStatus, ToolCall, ToolError,
    ToolExecutor, ToolResult, ToolSchema,
};
use shoot_llm::LLMProvider;
use shoot_mcp::{McpToolExecutor, ToolSet};

use crate::config::RunConfig;
use crate::events::EventSink;
use crate::runner::{run_agent_loop, Run};

/// The tool surface opened for one collector run.
pub struct ProvisionedTools {
    pub executor: Arc<dyn ToolExecutor>,
    toolset: Option<Arc<ToolSet>>,
}

impl ProvisionedTools {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            toolset: None,
        }
    }

    pub fn with_toolset(executor: Arc<dyn ToolExecutor>, toolset: Arc<ToolSet>) -> Self {
        Self {
            executor,
            toolset: Some(toolset),
        }
    }

    /// Releases every tool server the collector run opened.
    pub async fn close(self) {
        if let Some(toolset) = self.toolset {
            toolset.close().await;
        }
    }
}

/// Opens the tool servers a collector declares.
#[async_trait]
pub trait ToolProvisioner: Send + Sync {
    /// Fails with [`ToolError::Unavailable`] when a server cannot be opened.
    async fn open(
        &self,
        collector: &CollectorSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedTools>;
}

/// Opens fresh MCP sessions for every collector run.
pub struct McpProvisioner {
    config: Arc<Configuration>,
}

impl McpProvisioner {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolProvisioner for McpProvisioner {
    async fn open(
        &self,
        collector: &CollectorSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedTools> {
        let servers: Vec<ToolServerSpec> = collector
            .servers
            .iter()
            .filter_map(|id| self.config.tool_server(id).cloned())
            .collect();

        let toolset = ToolSet::open(&servers)
            .await
            .map_err(|e| ToolError::Unavailable(format!("{} for '{}'", e, collector.id())))?;
        let toolset = Arc::new(toolset);
        let executor = McpToolExecutor::new(
            toolset.clone(),
            collector.allowed_tools.clone(),
            cancel.clone(),
        );

        Ok(ProvisionedTools::with_toolset(Arc::new(executor), toolset))
    }
}

/// Per-collector metrics gathered over one investigation.
pub type Breakdown = Arc<Mutex<BTreeMap<String, RunMetrics>>>;

/// The coordinator's only tool surface: delegation to its collectors.
pub struct DelegationExecutor {
    config: Arc<Configuration>,
    llm: Arc<dyn LLMProvider>,
    provisioner: Arc<dyn ToolProvisioner>,
    parent: String,
    collectors: Vec<String>,
    events: EventSink,
    cancel: CancellationToken,
    deadline: Instant,
    breakdown: Breakdown,
}

impl DelegationExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Configuration>,
        llm: Arc<dyn LLMProvider>,
        provisioner: Arc<dyn ToolProvisioner>,
        parent: impl Into<String>,
        collectors: Vec<String>,
        events: EventSink,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> Self {
        Self {
            config,
            llm,
            provisioner,
            parent: parent.into(),
            collectors,
            events,
            cancel,
            deadline,
            breakdown: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Metrics of every collector run so far, one aggregated entry per id.
    pub fn breakdown(&self) -> BTreeMap<String, RunMetrics> {
        self.breakdown.lock().clone()
    }

    fn record(&self, collector: &CollectorSpec, run: &Run) {
        let cost = self
            .config
            .pricing_for(&run.model)
            .cost(run.usage.prompt_tokens, run.usage.completion_tokens);
        self.record_metrics(collector, run.metrics(cost));
    }

    fn record_metrics(&self, collector: &CollectorSpec, metrics: RunMetrics) {
        let mut breakdown = self.breakdown.lock();
        match breakdown.get_mut(collector.id()) {
            Some(entry) => entry.absorb(&metrics),
            None => {
                breakdown.insert(collector.id().to_string(), metrics);
            }
        }
    }

    async fn delegate(&self, collector: &CollectorSpec, query: &str) -> Result<ToolResult> {
        self.events
            .emit(RunEvent::DelegationStart {
                parent: self.parent.clone(),
                collector: collector.id().to_string(),
                query: query.to_string(),
            })
            .await;

        let child_cancel = self.cancel.child_token();
        let tools = match self.provisioner.open(collector, &child_cancel).await {
            Ok(tools) => tools,
            Err(e) => {
                self.record_metrics(
                    collector,
                    RunMetrics {
                        status: Some(RunStatus::Failed),
                        ..RunMetrics::default()
                    },
                );
                self.events
                    .emit(RunEvent::DelegationComplete {
                        parent: self.parent.clone(),
                        collector: collector.id().to_string(),
                        status: RunStatus::Failed,
                    })
                    .await;
                return Err(e);
            }
        };

        let system_prompt = collector
            .profile
            .instructions
            .render(&collector.profile.prompt_variables);
        let run_config =
            RunConfig::for_profile(&collector.profile, RunKind::Collector, system_prompt)
                .with_deadline(self.deadline);

        let run = run_agent_loop(
            &run_config,
            query,
            self.llm.clone(),
            tools.executor.clone(),
            &self.events,
            child_cancel,
        )
        .await;
        tools.close().await;

        self.record(collector, &run);
        self.events
            .emit(RunEvent::DelegationComplete {
                parent: self.parent.clone(),
                collector: collector.id().to_string(),
                status: run.status,
            })
            .await;

        Ok(delegation_result(run))
    }
}

/// The collector's answer, or a summary of why it has none.
fn delegation_result(run: Run) -> ToolResult {
    if run.status == RunStatus::Completed {
        return ToolResult::ok(run.final_text().unwrap_or_default());
    }

    let summary = json!({
        "collector": run.agent_id,
        "status": run.status,
        "error": run.error.as_ref().map(AgentError::to_string),
        "turns": run.model_calls,
    });
    ToolResult::error(summary.to_string())
}

fn delegation_schema(collector: &CollectorSpec) -> ToolSchema {
    ToolSchema::new(
        collector.id(),
        collector.profile.description.clone(),
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": format!("What {} should find out", collector.id())
                }
            },
            "required": ["query"]
        }),
    )
}

#[async_trait]
impl ToolExecutor for DelegationExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let name = call.name();
        if !self.collectors.iter().any(|c| c == name) {
            return Err(ToolError::NotAuthorized(name.to_string()));
        }
        let collector = self
            .config
            .collector(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = parse_tool_args(&call.function.arguments)?;
        let query = match args.get("query") {
            Some(Value::String(query)) if !query.trim().is_empty() => query.clone(),
            _ => {
                return Err(ToolError::InvalidArguments(
                    "'query' must be a non-empty string".to_string(),
                ))
            }
        };

        log::info!("[{}] Delegating to '{}': {}", self.parent, name, query);
        self.delegate(collector, &query).await
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.collectors
            .iter()
            .filter_map(|id| self.config.collector(id))
            .map(delegation_schema)
            .collect()
    }
}
