use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use shoot_config::ToolServerSpec;
use shoot_core::ToolSchema;

use crate::error::{McpError, Result};
use crate::handle::ToolHandle;
use crate::tool_index::ToolIndex;
use crate::types::McpCallResult;

/// The tool servers one collector run has open.
pub struct ToolSet {
    handles: HashMap<String, ToolHandle>,
    index: ToolIndex,
}

impl ToolSet {
    /// Opens every server concurrently. If any fails, the others are closed
    /// again and the first failure is returned.
    pub async fn open(servers: &[ToolServerSpec]) -> Result<Self> {
        let opened = join_all(servers.iter().map(ToolHandle::open)).await;

        let mut handles = Vec::with_capacity(opened.len());
        let mut failure = None;
        for (spec, result) in servers.iter().zip(opened) {
            match result {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!("Tool server '{}' failed to open: {}", spec.id, e);
                    failure.get_or_insert_with(|| {
                        McpError::Connection(format!("tool server '{}': {}", spec.id, e))
                    });
                }
            }
        }

        if let Some(error) = failure {
            for handle in &handles {
                handle.close().await;
            }
            return Err(error);
        }

        Ok(Self::from_handles(handles))
    }

    pub fn from_handles(handles: Vec<ToolHandle>) -> Self {
        let index = ToolIndex::new();
        let handles = handles
            .into_iter()
            .map(|handle| {
                index.register_server_tools(handle.server_id(), handle.list());
                (handle.server_id().to_string(), handle)
            })
            .collect();
        Self { handles, index }
    }

    /// Model-facing schemas for the aliases in `allowed`, sorted by alias.
    pub fn schemas(&self, allowed: &[String]) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .handles
            .values()
            .flat_map(|handle| {
                handle.list().iter().map(move |tool| {
                    ToolSchema::new(
                        shoot_config::model::tool_alias(handle.server_id(), &tool.name),
                        tool.description.clone(),
                        tool.input_schema.clone(),
                    )
                })
            })
            .filter(|schema| allowed.iter().any(|a| a == schema.name()))
            .collect();
        schemas.sort_by(|a, b| a.name().cmp(b.name()));
        schemas
    }

    pub async fn invoke(
        &self,
        alias: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<McpCallResult> {
        let (server, tool) = self
            .index
            .lookup(alias)
            .ok_or_else(|| McpError::ToolNotFound(alias.to_string()))?;
        let handle = self
            .handles
            .get(&server)
            .ok_or_else(|| McpError::ToolNotFound(alias.to_string()))?;
        handle.invoke(&tool, arguments, cancel).await
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub async fn close(&self) {
        join_all(self.handles.values().map(ToolHandle::close)).await;
        debug!("Closed {} tool servers", self.handles.len());
    }
}
