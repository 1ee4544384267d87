use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use shoot_config::ToolServerSpec;

use crate::handle::ToolHandle;

/// Outcome of opening one server end to end.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerProbe {
    pub server: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connects, lists tools and pings, then closes the session again.
pub async fn probe_server(spec: &ToolServerSpec, timeout: Duration) -> ServerProbe {
    let attempt = async {
        let handle = ToolHandle::open(spec).await?;
        let pinged = handle.ping().await;
        handle.close().await;
        pinged
    };

    let error = match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no answer within {}s", timeout.as_secs())),
    };
    debug!("Probe of '{}': {:?}", spec.id, error);

    ServerProbe {
        server: spec.id.clone(),
        ok: error.is_none(),
        error,
    }
}

pub async fn probe_servers<'a>(
    servers: impl IntoIterator<Item = &'a ToolServerSpec>,
    timeout: Duration,
) -> Vec<ServerProbe> {
    join_all(servers.into_iter().map(|spec| probe_server(spec, timeout))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoot_config::Connection;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn unreachable_command_fails_probe() {
        let spec = ToolServerSpec {
            id: "ghost".to_string(),
            connection: Connection::Command {
                command: "/nonexistent/ghost-mcp".to_string(),
                args: vec![],
                env: BTreeMap::new(),
            },
            tools: vec!["haunt".to_string()],
            request_timeout: Duration::from_secs(1),
        };

        let probes = probe_servers([&spec], Duration::from_secs(2)).await;
        assert_eq!(probes.len(), 1);
        assert!(!probes[0].ok);
        assert!(probes[0].error.as_deref().unwrap().contains("spawn"));
    }
}
