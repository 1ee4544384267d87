use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use shoot_mcp::probe_servers;

use crate::state::AppState;

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
pub struct ReadyQuery {
    #[serde(default)]
    pub deep: bool,
}

/// Shallow readiness only confirms a configuration is loaded. A deep check
/// opens every tool server and asks the model endpoint for a health check,
/// without running an agent.
pub async fn ready(state: web::Data<AppState>, query: web::Query<ReadyQuery>) -> impl Responder {
    let config = state.config();
    let agents = config.agent_names();

    if !query.deep {
        return HttpResponse::Ok().json(json!({
            "status": "ready",
            "agents": agents,
            "tool_servers": config.tool_servers.len(),
        }));
    }

    let (probes, model) = futures::join!(
        probe_servers(config.tool_servers.values(), state.probe_timeout),
        state.llm().health_check()
    );

    let failed_servers: Vec<_> = probes.iter().filter(|probe| !probe.ok).cloned().collect();
    let model = match model {
        Ok(()) => json!({ "provider": state.llm().name(), "ok": true }),
        Err(e) => {
            log::warn!("Model endpoint readiness failed: {}", e);
            json!({ "provider": state.llm().name(), "ok": false, "error": e.to_string() })
        }
    };
    let model_ok = model["ok"].as_bool().unwrap_or(false);

    if failed_servers.is_empty() && model_ok {
        HttpResponse::Ok().json(json!({
            "status": "ready",
            "agents": agents,
            "servers": probes,
            "model": model,
        }))
    } else {
        log::warn!(
            "Not ready: {} tool server(s) failed, model ok: {}",
            failed_servers.len(),
            model_ok
        );
        HttpResponse::ServiceUnavailable().json(json!({
            "status": "not_ready",
            "agents": agents,
            "failed_servers": failed_servers,
            "model": model,
        }))
    }
}
