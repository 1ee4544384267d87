use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{McpError, Result};
use crate::protocol::McpTransport;

pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Streamable HTTP transport: every message is a POST, and the reply comes
/// back in that POST's body as JSON or as a short event stream.
pub struct StreamableHttpTransport {
    server_id: String,
    url: Url,
    headers: HeaderMap,
    client: Client,
    connected: AtomicBool,
    session_id: Mutex<Option<String>>,
    inbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl StreamableHttpTransport {
    pub fn new(server_id: &str, url: Url, headers: HeaderMap) -> Self {
        Self {
            server_id: server_id.to_string(),
            url,
            headers,
            client: Client::new(),
            connected: AtomicBool::new(false),
            session_id: Mutex::new(None),
            inbound: Mutex::new(None),
        }
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }
}

/// Forwards a JSON body, splitting batches into single frames.
async fn forward_json(body: &str, tx: &mpsc::Sender<String>) {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(frames)) => {
            for frame in frames {
                let _ = tx.send(frame.to_string()).await;
            }
        }
        Ok(_) => {
            let _ = tx.send(body.to_string()).await;
        }
        Err(e) => warn!("Discarding non-JSON response body: {}", e),
    }
}

async fn forward_body(response: Response, tx: mpsc::Sender<String>) {
    let is_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false);

    if is_stream {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) if event.data.trim().is_empty() => {}
                Ok(event) => forward_json(&event.data, &tx).await,
                Err(e) => {
                    warn!("Response stream error: {}", e);
                    break;
                }
            }
        }
    } else {
        match response.text().await {
            Ok(body) if body.trim().is_empty() => {}
            Ok(body) => forward_json(&body, &tx).await,
            Err(e) => warn!("Failed to read response body: {}", e),
        }
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<String>> {
        info!(
            "Using MCP server '{}' at {}",
            self.server_id,
            super::url_origin(&self.url)
        );
        let (tx, rx) = mpsc::channel(100);
        *self.inbound.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, message: String) -> Result<()> {
        let tx = self.inbound.lock().clone().ok_or(McpError::Disconnected)?;

        let mut request = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .body(message);
        if let Some(session) = self.session_id() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock() = Some(session.to_string());
        }

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {} - {}",
                status, body
            )));
        }

        tokio::spawn(forward_body(response, tx));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.inbound.lock().take();

        let session = self.session_id.lock().take();
        if let Some(session) = session {
            let result = self
                .client
                .delete(self.url.clone())
                .headers(self.headers.clone())
                .header(SESSION_HEADER, session)
                .send()
                .await;
            if let Err(e) = result {
                debug!("Session teardown for '{}' failed: {}", self.server_id, e);
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
