use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shoot_core::{RenderMode, ResponseSchema};

use crate::prompt::PromptTemplate;

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_ORCHESTRATOR_MODEL: &str = "claude-sonnet-4-5-20250514";
pub const DEFAULT_COLLECTOR_MODEL: &str = "claude-3-5-haiku-20241022";

pub const INVESTIGATION_TIMEOUT_RANGE: (u64, u64) = (30, 600);
pub const SUBAGENT_TIMEOUT_RANGE: (u64, u64) = (10, 300);
pub const INVESTIGATION_TURNS_RANGE: (u32, u32) = (5, 50);
pub const SUBAGENT_TURNS_RANGE: (u32, u32) = (3, 30);

// Raw document shapes, as written in YAML.

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub defaults: DefaultsDoc,
    #[serde(default)]
    pub response_schemas: BTreeMap<String, ResponseSchemaDoc>,
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerDoc>,
    #[serde(default)]
    pub subagents: BTreeMap<String, SubagentDoc>,
    #[serde(default, alias = "assistants")]
    pub agents: BTreeMap<String, AgentDoc>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsDoc {
    #[serde(default)]
    pub models: ModelDefaults,
    #[serde(default)]
    pub timeouts: TimeoutDefaults,
    #[serde(default)]
    pub max_turns: TurnDefaults,
    #[serde(default)]
    pub response_format: RenderMode,
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefaults {
    #[serde(default = "default_orchestrator_model")]
    pub orchestrator: String,
    #[serde(default = "default_collector_model")]
    pub collector: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            orchestrator: default_orchestrator_model(),
            collector: default_collector_model(),
        }
    }
}

fn default_orchestrator_model() -> String {
    DEFAULT_ORCHESTRATOR_MODEL.to_string()
}

fn default_collector_model() -> String {
    DEFAULT_COLLECTOR_MODEL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutDefaults {
    #[serde(default = "default_investigation_timeout")]
    pub investigation: u64,
    #[serde(default = "default_subagent_timeout")]
    pub subagent: u64,
}

impl Default for TimeoutDefaults {
    fn default() -> Self {
        Self {
            investigation: default_investigation_timeout(),
            subagent: default_subagent_timeout(),
        }
    }
}

fn default_investigation_timeout() -> u64 {
    300
}

fn default_subagent_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnDefaults {
    #[serde(default = "default_investigation_turns")]
    pub investigation: u32,
    #[serde(default = "default_subagent_turns")]
    pub subagent: u32,
}

impl Default for TurnDefaults {
    fn default() -> Self {
        Self {
            investigation: default_investigation_turns(),
            subagent: default_subagent_turns(),
        }
    }
}

fn default_investigation_turns() -> u32 {
    15
}

fn default_subagent_turns() -> u32 {
    10
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    #[serde(default)]
    pub input_per_mtok: f64,
    #[serde(default)]
    pub output_per_mtok: f64,
}

impl ModelPricing {
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) * self.input_per_mtok
            + f64::from(completion_tokens) * self.output_per_mtok)
            / 1_000_000.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSchemaDoc {
    pub file: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub format: Option<RenderMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpServerDoc {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubagentDoc {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_prompt_file: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub prompt_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_turns: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentDoc {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_prompt_file: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub subagents: Vec<String>,
    #[serde(default)]
    pub response_schema: Option<String>,
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_turns: u32,
    #[serde(default)]
    pub prompt_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub request_variables: Vec<String>,
}

// Resolved, immutable records shared by every run.

#[derive(Debug, Clone, PartialEq)]
pub enum Connection {
    Command {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    Endpoint {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolServerSpec {
    pub id: String,
    pub connection: Connection,
    /// Tool names (as the server reports them) that may be exposed.
    pub tools: Vec<String>,
    pub request_timeout: Duration,
}

impl ToolServerSpec {
    pub fn allows(&self, tool: &str) -> bool {
        self.tools.iter().any(|allowed| allowed == tool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_turns: u32,
    pub timeout: Duration,
}

/// Fields shared by agents and collectors.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub id: String,
    pub description: String,
    pub instructions: PromptTemplate,
    pub model: String,
    pub budget: Budget,
    pub prompt_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CollectorSpec {
    pub profile: AgentProfile,
    pub servers: Vec<String>,
    /// Aliased tool names (`mcp__server__tool`) this collector may call.
    pub allowed_tools: Vec<String>,
}

impl CollectorSpec {
    pub fn id(&self) -> &str {
        &self.profile.id
    }
}

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub profile: AgentProfile,
    pub collectors: Vec<String>,
    pub response_schema: Option<String>,
    pub request_variables: Vec<String>,
}

impl AgentSpec {
    pub fn id(&self) -> &str {
        &self.profile.id
    }
}

/// The validated configuration. Read-only after load.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub version: String,
    pub source_dir: PathBuf,
    pub tool_servers: BTreeMap<String, ToolServerSpec>,
    pub collectors: BTreeMap<String, CollectorSpec>,
    pub agents: BTreeMap<String, AgentSpec>,
    pub response_schemas: BTreeMap<String, ResponseSchema>,
    pub pricing: HashMap<String, ModelPricing>,
}

impl Configuration {
    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.get(id)
    }

    pub fn collector(&self, id: &str) -> Option<&CollectorSpec> {
        self.collectors.get(id)
    }

    pub fn tool_server(&self, id: &str) -> Option<&ToolServerSpec> {
        self.tool_servers.get(id)
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn schema_for(&self, agent: &AgentSpec) -> Option<&ResponseSchema> {
        agent
            .response_schema
            .as_deref()
            .and_then(|id| self.response_schemas.get(id))
    }

    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        self.pricing.get(model).copied().unwrap_or_default()
    }
}

/// Splits `mcp__server__tool` into its server and tool parts.
pub fn split_tool_alias(alias: &str) -> Option<(&str, &str)> {
    let rest = alias.strip_prefix("mcp__")?;
    let (server, tool) = rest.split_once("__")?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

pub fn tool_alias(server: &str, tool: &str) -> String {
    format!("mcp__{server}__{tool}")
}
