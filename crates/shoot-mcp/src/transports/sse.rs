use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use super::CONNECT_TIMEOUT;
use crate::error::{McpError, Result};
use crate::protocol::McpTransport;

/// Legacy HTTP+SSE transport: responses arrive on a long-lived event
/// stream, requests are POSTed to the endpoint the stream announces.
pub struct SseTransport {
    server_id: String,
    url: Url,
    headers: HeaderMap,
    client: Client,
    connected: Arc<AtomicBool>,
    endpoint: Option<Url>,
    stream_task: Option<tokio::task::JoinHandle<()>>,
}

impl SseTransport {
    pub fn new(server_id: &str, url: Url, headers: HeaderMap) -> Self {
        Self {
            server_id: server_id.to_string(),
            url,
            headers,
            client: Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            endpoint: None,
            stream_task: None,
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<String>> {
        info!(
            "Connecting to MCP server '{}' at {}",
            self.server_id,
            super::url_origin(&self.url)
        );

        let response = self
            .client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::Connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(100);
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let connected = self.connected.clone();
        let server_id = self.server_id.clone();

        let task = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut stream = response.bytes_stream().eventsource();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => {
                        if let Some(sender) = endpoint_tx.take() {
                            let _ = sender.send(event.data);
                        }
                    }
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => debug!("Ignoring SSE event '{}'", event.event),
                    Err(e) => {
                        warn!("SSE stream error from '{}': {}", server_id, e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            debug!("SSE stream ended for '{}'", server_id);
        });

        let endpoint = match tokio::time::timeout(CONNECT_TIMEOUT, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                task.abort();
                return Err(McpError::Connection(
                    "SSE stream closed before announcing an endpoint".to_string(),
                ));
            }
            Err(_) => {
                task.abort();
                return Err(McpError::Timeout(
                    "no endpoint event on SSE stream".to_string(),
                ));
            }
        };

        let endpoint = self
            .url
            .join(endpoint.trim())
            .map_err(|e| McpError::Protocol(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        debug!("MCP server '{}' endpoint: {}", self.server_id, endpoint);

        self.endpoint = Some(endpoint);
        self.stream_task = Some(task);
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, message: String) -> Result<()> {
        let endpoint = match (&self.endpoint, self.is_connected()) {
            (Some(endpoint), true) => endpoint.clone(),
            _ => return Err(McpError::Disconnected),
        };

        let response = self
            .client
            .post(endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {} - {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = &self.stream_task {
            task.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}
