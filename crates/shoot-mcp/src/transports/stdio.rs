use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{McpError, Result};
use crate::protocol::McpTransport;

/// Runs a tool server as a child process speaking newline-delimited JSON-RPC.
pub struct StdioTransport {
    server_id: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    connected: Arc<AtomicBool>,
}

impl StdioTransport {
    pub fn new(
        server_id: &str,
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    ) -> Self {
        Self {
            server_id: server_id.to_string(),
            command,
            args,
            env,
            child: Mutex::new(None),
            stdin: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<String>> {
        info!(
            "Starting MCP server '{}': {}",
            self.server_id,
            super::command_summary(&self.command, &self.args, &self.env)
        );

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn MCP server '{}': {}", self.server_id, e);
            McpError::Connection(format!("Failed to spawn '{}': {}", self.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let server_id = self.server_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{} stderr] {}", server_id, line);
                }
            });
        }

        let (tx, rx) = mpsc::channel(100);
        let connected = self.connected.clone();
        let server_id = self.server_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        warn!("MCP server '{}' closed stdout", server_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read from MCP server '{}': {}", server_id, e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        });

        *self.child.lock().await = Some(child);
        *self.stdin.lock().await = Some(stdin);
        self.connected.store(true, Ordering::SeqCst);

        Ok(rx)
    }

    async fn send(&self, message: String) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::Disconnected)?;

        stdin
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("Failed to write: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to flush: {}", e)))?;

        debug!("Sent to '{}': {}", self.server_id, message);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        // Closing stdin is the shutdown signal.
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(_)) => debug!("MCP server '{}' exited", self.server_id),
                _ => {
                    warn!("MCP server '{}' did not exit, killing", self.server_id);
                    let _ = child.kill().await;
                }
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
