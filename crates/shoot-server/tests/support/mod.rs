#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shoot_config::{load_config_str, CollectorSpec};
use shoot_core::tools::Result as ToolOutcome;
use shoot_core::{TokenUsage, ToolCall, ToolError, ToolExecutor, ToolResult, ToolSchema};
use shoot_llm::{FinishReason, LLMError, LLMProvider, LLMRequest, LLMResponse, ToolCallPart};
use shoot_loop::{Investigator, ProvisionedTools, ToolProvisioner};
use shoot_server::AppState;

pub const CONFIG: &str = r#"
version: "1.0"
defaults:
  models:
    orchestrator: coordinator-model
    collector: collector-model
  pricing:
    coordinator-model: { input_per_mtok: 1.0, output_per_mtok: 2.0 }
response_schemas:
  diagnostic:
    file: diagnostic.json
    format: json
    description: Diagnostic report
mcp_servers:
  kubernetes:
    command: /nonexistent/kubernetes-mcp-server
    tools: [namespaces_list]
subagents:
  kube:
    description: Kubernetes collector
    system_prompt: "You are kube."
    mcp_servers: [kubernetes]
agents:
  triage:
    description: Cluster triage
    system_prompt: "You are triage. Look at $namespace."
    subagents: [kube]
    request_variables: [namespace]
  report:
    description: Structured report
    system_prompt: "You are report."
    subagents: [kube]
    response_schema: diagnostic
"#;

pub const DIAGNOSTIC: &str = r#"{
  "type": "object",
  "required": ["summary", "severity"],
  "properties": {
    "summary": {"type": "string"},
    "severity": {"type": "string", "enum": ["low", "high"]}
  }
}"#;

pub enum Step {
    Reply(LLMResponse),
    Fail(&'static str),
    Hang,
}

pub fn text_reply(text: &str) -> LLMResponse {
    LLMResponse {
        text: vec![text.to_string()],
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        usage: TokenUsage::new(10, 5),
    }
}

pub fn tool_reply(id: &str, name: &str, args: &str) -> LLMResponse {
    LLMResponse {
        text: Vec::new(),
        tool_calls: vec![ToolCallPart::decode(id, name, args)],
        finish_reason: FinishReason::ToolCalls,
        usage: TokenUsage::new(10, 5),
    }
}

/// Replays canned steps per agent, chosen by a key in the system prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<Vec<(String, VecDeque<Step>)>>,
    healthy: bool,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn script(self, key: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((key.to_string(), steps.into()));
        self
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &LLMRequest) -> shoot_llm::Result<LLMResponse> {
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .iter_mut()
                .find(|(key, _)| prompt.contains(key.as_str()))
                .and_then(|(_, steps)| steps.pop_front())
        };

        match step {
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
        if self.healthy {
            Ok(())
        } else {
            Err(LLMError::Auth("HTTP 401: bad key".to_string()))
        }
    }
}

/// Every collector gets a single `mcp__kubernetes__namespaces_list` tool.
pub struct NamespaceTools;

#[async_trait]
impl ToolExecutor for NamespaceTools {
    async fn execute(&self, call: &ToolCall) -> ToolOutcome<ToolResult> {
        if call.name() == "mcp__kubernetes__namespaces_list" {
            Ok(ToolResult::ok("default, kube-system, payments"))
        } else {
            Err(ToolError::NotFound(call.name().to_string()))
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        vec![ToolSchema::new(
            "mcp__kubernetes__namespaces_list",
            "List namespaces",
            serde_json::json!({"type": "object", "properties": {}}),
        )]
    }
}

pub struct FakeProvisioner;

#[async_trait]
impl ToolProvisioner for FakeProvisioner {
    async fn open(
        &self,
        _collector: &CollectorSpec,
        _cancel: &CancellationToken,
    ) -> ToolOutcome<ProvisionedTools> {
        Ok(ProvisionedTools::new(Arc::new(NamespaceTools)))
    }
}

/// Application state over the test configuration. Keep the returned
/// directory alive for as long as the state is used.
pub fn app_state(llm: ScriptedLlm) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("diagnostic.json"), DIAGNOSTIC).unwrap();
    let config = load_config_str(CONFIG, dir.path(), &|_: &str| None).unwrap();
    let investigator =
        Investigator::with_provisioner(Arc::new(config), Arc::new(llm), Arc::new(FakeProvisioner));
    let state = AppState::new(investigator).with_probe_timeout(Duration::from_secs(2));
    (state, dir)
}
