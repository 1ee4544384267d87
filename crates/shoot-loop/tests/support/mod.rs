#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shoot_config::{load_config_str, CollectorSpec, Configuration};
use shoot_core::tools::Result as ToolOutcome;
use shoot_core::{TokenUsage, ToolCall, ToolError, ToolExecutor, ToolResult, ToolSchema};
use shoot_llm::{FinishReason, LLMError, LLMProvider, LLMRequest, LLMResponse, ToolCallPart};
use shoot_loop::{ProvisionedTools, ToolProvisioner};

pub const CONFIG: &str = r#"
version: "1.0"
defaults:
  models:
    orchestrator: coordinator-model
    collector: collector-model
  pricing:
    coordinator-model: { input_per_mtok: 1.0, output_per_mtok: 2.0 }
mcp_servers:
  kubernetes:
    command: kubernetes-mcp-server
    tools: [namespaces_list, pods_list]
  metrics:
    command: prometheus-mcp-server
    tools: [query]
subagents:
  kube:
    description: Kubernetes collector
    system_prompt: "You are kube. Collect from $cluster."
    mcp_servers: [kubernetes]
    allowed_tools: [mcp__kubernetes__namespaces_list]
    prompt_variables:
      cluster: staging
  prom:
    description: Metrics collector
    system_prompt: "You are prom. Query metrics."
    mcp_servers: [metrics]
agents:
  triage:
    description: Cluster triage
    system_prompt: "You are triage. Investigate $namespace."
    subagents: [kube, prom]
    max_turns: 4
    request_variables: [namespace]
"#;

pub fn load(yaml: &str, base_dir: &Path) -> Arc<Configuration> {
    let config = load_config_str(yaml, base_dir, &|_: &str| None).unwrap();
    Arc::new(config)
}

pub fn test_config() -> Arc<Configuration> {
    load(CONFIG, Path::new("."))
}

pub fn usage() -> TokenUsage {
    TokenUsage::new(10, 5)
}

pub fn text_reply(text: &str) -> LLMResponse {
    LLMResponse {
        text: vec![text.to_string()],
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        usage: usage(),
    }
}

pub fn tool_reply(calls: &[(&str, &str, &str)]) -> LLMResponse {
    LLMResponse {
        text: Vec::new(),
        tool_calls: calls
            .iter()
            .map(|(id, name, args)| ToolCallPart::decode(*id, *name, *args))
            .collect(),
        finish_reason: FinishReason::ToolCalls,
        usage: usage(),
    }
}

pub enum Step {
    Reply(LLMResponse),
    Fail(&'static str),
    Hang,
}

/// Replays canned responses, chosen by a key found in the system prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<Vec<(String, VecDeque<Step>)>>,
    repeat: Mutex<Vec<(String, LLMResponse)>>,
    pub requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, key: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((key.to_string(), steps.into()));
        self
    }

    /// Answer used whenever the script for `key` has run out.
    pub fn repeat(self, key: &str, response: LLMResponse) -> Self {
        self.repeat
            .lock()
            .unwrap()
            .push((key.to_string(), response));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_step(&self, prompt: &str) -> Option<Step> {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some((_, steps)) = scripts.iter_mut().find(|(key, _)| prompt.contains(key.as_str())) {
            if let Some(step) = steps.pop_front() {
                return Some(step);
            }
        }
        self.repeat
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, response)| Step::Reply(response.clone()))
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &LLMRequest) -> shoot_llm::Result<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        match self.next_step(&prompt) {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(reason)) => Err(LLMError::Api(reason.to_string())),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(LLMError::Api("hung".to_string()))
            }
            None => Err(LLMError::Api(format!("script exhausted for: {prompt}"))),
        }
    }

    async fn health_check(&self) -> shoot_llm::Result<()> {
        Ok(())
    }
}

/// In-memory tools returning fixed text.
pub struct StaticTools {
    tools: Vec<(String, String)>,
    pub calls: Mutex<Vec<ToolCall>>,
}

impl StaticTools {
    pub fn new(tools: &[(&str, &str)]) -> Self {
        Self {
            tools: tools
                .iter()
                .map(|(name, result)| (name.to_string(), result.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolExecutor for StaticTools {
    async fn execute(&self, call: &ToolCall) -> ToolOutcome<ToolResult> {
        self.calls.lock().unwrap().push(call.clone());
        self.tools
            .iter()
            .find(|(name, _)| name == call.name())
            .map(|(_, result)| ToolResult::ok(result.clone()))
            .ok_or_else(|| ToolError::NotFound(call.name().to_string()))
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|(name, _)| ToolSchema::new(name, "static tool", serde_json::json!({"type": "object"})))
            .collect()
    }
}

/// Hands out in-memory tools per collector; listed collectors are "down".
#[derive(Default)]
pub struct FakeProvisioner {
    tools: HashMap<String, Arc<StaticTools>>,
    down: Vec<String>,
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, collector: &str, tools: Arc<StaticTools>) -> Self {
        self.tools.insert(collector.to_string(), tools);
        self
    }

    pub fn down(mut self, collector: &str) -> Self {
        self.down.push(collector.to_string());
        self
    }
}

#[async_trait]
impl ToolProvisioner for FakeProvisioner {
    async fn open(
        &self,
        collector: &CollectorSpec,
        _cancel: &CancellationToken,
    ) -> ToolOutcome<ProvisionedTools> {
        if self.down.iter().any(|id| id == collector.id()) {
            return Err(ToolError::Unavailable(format!(
                "tool server for '{}' failed to start",
                collector.id()
            )));
        }
        let tools = self
            .tools
            .get(collector.id())
            .cloned()
            .unwrap_or_else(|| Arc::new(StaticTools::new(&[])));
        Ok(ProvisionedTools::new(tools))
    }
}
