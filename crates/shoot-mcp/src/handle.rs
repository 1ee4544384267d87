use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shoot_config::ToolServerSpec;

use crate::error::{McpError, Result};
use crate::protocol::{McpProtocolClient, McpTransport};
use crate::transports::transport_for;
use crate::types::{McpCallResult, ToolDescriptor};

/// One live session with one tool server, limited to its allow-list.
pub struct ToolHandle {
    spec: ToolServerSpec,
    client: McpProtocolClient,
    tools: Vec<ToolDescriptor>,
}

impl ToolHandle {
    /// Connects to the server, performs the handshake and discovers tools.
    pub async fn open(spec: &ToolServerSpec) -> Result<Self> {
        let transport = transport_for(spec)?;
        Self::open_with(spec, transport).await
    }

    pub async fn open_with(spec: &ToolServerSpec, transport: Box<dyn McpTransport>) -> Result<Self> {
        let client = McpProtocolClient::connect(transport).await?;

        match Self::handshake(spec, &client).await {
            Ok(tools) => Ok(Self {
                spec: spec.clone(),
                client,
                tools,
            }),
            Err(e) => {
                let _ = client.disconnect().await;
                Err(e)
            }
        }
    }

    async fn handshake(
        spec: &ToolServerSpec,
        client: &McpProtocolClient,
    ) -> Result<Vec<ToolDescriptor>> {
        let init = client.initialize(spec.request_timeout).await?;
        info!(
            "Connected to tool server '{}' ({} {}, protocol {})",
            spec.id, init.server_info.name, init.server_info.version, init.protocol_version
        );

        let discovered = client.list_tools(spec.request_timeout).await?;
        let tools: Vec<ToolDescriptor> = discovered
            .into_iter()
            .filter(|tool| spec.allows(&tool.name))
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description.unwrap_or_default(),
                input_schema: tool
                    .input_schema
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
            .collect();

        for allowed in &spec.tools {
            if !tools.iter().any(|tool| &tool.name == allowed) {
                warn!(
                    "Tool server '{}' does not offer allow-listed tool '{}'",
                    spec.id, allowed
                );
            }
        }

        debug!("Tool server '{}' exposes {} tools", spec.id, tools.len());
        Ok(tools)
    }

    pub fn server_id(&self) -> &str {
        &self.spec.id
    }

    /// Allow-listed tools the server actually offers.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub async fn invoke(
        &self,
        tool: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<McpCallResult> {
        if !self.spec.allows(tool) {
            return Err(McpError::ToolNotAuthorized {
                server: self.spec.id.clone(),
                tool: tool.to_string(),
            });
        }
        if !self.tools.iter().any(|t| t.name == tool) {
            return Err(McpError::ToolNotFound(format!("{}/{}", self.spec.id, tool)));
        }

        debug!("Invoking {}/{}", self.spec.id, tool);
        self.client
            .call_tool(tool, arguments, self.spec.request_timeout, cancel)
            .await
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.ping(self.spec.request_timeout).await
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn close(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Closing tool server '{}' failed: {}", self.spec.id, e);
        }
    }
}
