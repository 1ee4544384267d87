pub mod http;
pub mod sse;
pub mod stdio;

pub use http::StreamableHttpTransport;
pub use sse::SseTransport;
pub use stdio::StdioTransport;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;

use shoot_config::{Connection, ToolServerSpec};

use crate::error::{McpError, Result};
use crate::protocol::McpTransport;

/// How long an endpoint transport may take to establish its stream.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Picks the transport for a declared server.
///
/// Endpoint URLs whose path ends in `/sse` use the legacy SSE transport;
/// every other endpoint speaks streamable HTTP.
pub fn transport_for(spec: &ToolServerSpec) -> Result<Box<dyn McpTransport>> {
    match &spec.connection {
        Connection::Command { command, args, env } => Ok(Box::new(StdioTransport::new(
            &spec.id,
            command.clone(),
            args.clone(),
            env.clone(),
        ))),
        Connection::Endpoint { url, headers } => {
            let parsed = url::Url::parse(url).map_err(|e| {
                McpError::InvalidConfig(format!("server '{}' has an invalid URL: {}", spec.id, e))
            })?;
            let headers = build_headers(headers)?;
            if parsed.path().trim_end_matches('/').ends_with("/sse") {
                Ok(Box::new(SseTransport::new(&spec.id, parsed, headers)))
            } else {
                Ok(Box::new(StreamableHttpTransport::new(&spec.id, parsed, headers)))
            }
        }
    }
}

/// Scheme, host and port of `url`, for logs. Paths, queries and
/// credentials may carry interpolated secrets and are left out.
pub(crate) fn url_origin(url: &url::Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
        (Some(host), None) => format!("{}://{}", url.scheme(), host),
        _ => format!("{}://", url.scheme()),
    }
}

/// Command name plus counts, for logs. Argument and env values are left out.
pub(crate) fn command_summary(
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
) -> String {
    let keys: Vec<&str> = env.keys().map(String::as_str).collect();
    format!(
        "{} ({} arg(s), env: [{}])",
        command,
        args.len(),
        keys.join(", ")
    )
}

pub(crate) fn build_headers(configured: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in configured {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
