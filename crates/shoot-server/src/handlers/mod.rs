pub mod agents;
pub mod health;
pub mod query;
pub mod stream;

use std::collections::HashMap;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::json;

use shoot_core::AgentError;
use shoot_loop::{InvestigationError, InvestigationRequest};

/// Body accepted by `POST /` and `POST /stream`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default, alias = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, alias = "maxTurns")]
    pub max_turns: Option<u32>,
}

impl QueryBody {
    /// Rejects a missing or blank query with a ready-made 400.
    pub fn into_request(self) -> Result<InvestigationRequest, HttpResponse> {
        let query = self
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                HttpResponse::BadRequest().json(json!({ "error": "Query is required" }))
            })?;

        Ok(InvestigationRequest {
            query,
            agent: self.agent.filter(|a| !a.trim().is_empty()),
            variables: self.variables,
            timeout: self
                .timeout_seconds
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_turns: self.max_turns.filter(|turns| *turns > 0),
            request_id: None,
        })
    }
}

pub fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::AgentRequired { .. } => StatusCode::BAD_REQUEST,
        AgentError::AgentNotFound { .. } => StatusCode::NOT_FOUND,
        AgentError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        AgentError::SchemaValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Resolution failures raised before a run starts.
pub fn agent_error_response(error: &AgentError) -> HttpResponse {
    let mut body = json!({ "error": error.to_string() });
    match error {
        AgentError::AgentNotFound { available, .. } | AgentError::AgentRequired { available } => {
            body["available"] = json!(available);
        }
        _ => {}
    }
    HttpResponse::build(status_for(error)).json(body)
}

pub fn investigation_error_response(failure: &InvestigationError) -> HttpResponse {
    let mut body = json!({
        "error": failure.error.to_string(),
        "request_id": failure.request_id,
    });
    if let Some(agent) = &failure.agent {
        body["agent"] = json!(agent);
    }
    match &failure.error {
        AgentError::AgentNotFound { available, .. } | AgentError::AgentRequired { available } => {
            body["available"] = json!(available);
        }
        _ => {}
    }
    if let Some(metrics) = &failure.metrics {
        body["metrics"] = json!(metrics);
    }
    HttpResponse::build(status_for(&failure.error)).json(body)
}
