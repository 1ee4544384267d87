use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;
use crate::types::McpCallResult;

/// Transport trait for MCP communication.
///
/// `connect` hands back the stream of inbound frames; the transport closes
/// that stream when the server goes away.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&mut self) -> Result<mpsc::Receiver<String>>;
    async fn send(&self, message: String) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// MCP protocol client
pub struct McpProtocolClient {
    transport: Arc<dyn McpTransport>,
    next_id: AtomicU64,
    pending_requests: PendingRequests,
    message_handler: tokio::task::JoinHandle<()>,
}

impl McpProtocolClient {
    pub async fn connect(mut transport: Box<dyn McpTransport>) -> Result<Self> {
        let inbound = transport.connect().await?;
        let transport: Arc<dyn McpTransport> = Arc::from(transport);
        let pending_requests: PendingRequests = Arc::new(Mutex::new(HashMap::new()));

        let message_handler = tokio::spawn(Self::handle_messages(
            inbound,
            transport.clone(),
            pending_requests.clone(),
        ));

        Ok(Self {
            transport,
            next_id: AtomicU64::new(1),
            pending_requests,
            message_handler,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected() && !self.message_handler.is_finished()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.message_handler.abort();
        self.pending_requests.lock().clear();
        self.transport.disconnect().await
    }

    async fn handle_messages(
        mut inbound: mpsc::Receiver<String>,
        transport: Arc<dyn McpTransport>,
        pending_requests: PendingRequests,
    ) {
        while let Some(message) = inbound.recv().await {
            debug!("Received message: {}", message);
            match IncomingMessage::parse(&message) {
                Some(IncomingMessage::Response(response)) => {
                    let Some(id) = response.id.as_u64() else {
                        warn!("Response with non-numeric id: {}", response.id);
                        continue;
                    };
                    let sender = pending_requests.lock().remove(&id);
                    match sender {
                        Some(sender) => {
                            let _ = sender.send(response);
                        }
                        None => debug!("Dropping response for unknown request {}", id),
                    }
                }
                Some(IncomingMessage::Request { id, method }) => {
                    let reply = if method == "ping" {
                        JsonRpcResponse::success(id, json!({}))
                    } else {
                        JsonRpcResponse::failure(
                            id,
                            METHOD_NOT_FOUND,
                            format!("Method not supported: {}", method),
                        )
                    };
                    match serde_json::to_string(&reply) {
                        Ok(reply) => {
                            if let Err(e) = transport.send(reply).await {
                                warn!("Failed to answer server request: {}", e);
                            }
                        }
                        Err(e) => warn!("Failed to encode reply: {}", e),
                    }
                }
                Some(IncomingMessage::Notification(notification)) => {
                    debug!("Server notification: {}", notification.method);
                }
                None => warn!("Ignoring unparseable message"),
            }
        }

        // Dropping the senders fails every in-flight request with Disconnected.
        debug!("Inbound stream closed");
        pending_requests.lock().clear();
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        if self.message_handler.is_finished() {
            return Err(McpError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.lock().insert(id, tx);

        if let Err(e) = self.transport.send(request_json).await {
            self.pending_requests.lock().remove(&id);
            return Err(e);
        }

        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        let outcome = tokio::select! {
            outcome = tokio::time::timeout(timeout, rx) => outcome,
            _ = cancel.cancelled() => {
                self.pending_requests.lock().remove(&id);
                self.notify(
                    "notifications/cancelled",
                    Some(json!({"requestId": id, "reason": "run cancelled"})),
                )
                .await
                .ok();
                return Err(McpError::Cancelled);
            }
        };

        match outcome {
            Ok(Ok(response)) => match response.error {
                Some(error) => Err(McpError::Protocol(format!(
                    "{}: {}",
                    error.code, error.message
                ))),
                None => Ok(response.result.unwrap_or(Value::Null)),
            },
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.pending_requests.lock().remove(&id);
                Err(McpError::Timeout(format!(
                    "{} (request {}) timed out after {}ms",
                    method,
                    id,
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport
            .send(serde_json::to_string(&notification)?)
            .await
    }

    pub async fn initialize(&self, timeout: Duration) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let result = self
            .send_request("initialize", Some(params), timeout, None)
            .await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<McpToolInfo>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self
                .send_request("tools/list", params, timeout, None)
                .await?;
            let page: McpToolListResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<McpCallResult> {
        let params = serde_json::to_value(McpToolCallRequest {
            name: name.to_string(),
            arguments,
        })?;
        let result = self
            .send_request("tools/call", Some(params), timeout, Some(cancel))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        self.send_request("ping", None, timeout, None).await?;
        Ok(())
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        self.message_handler.abort();
    }
}
