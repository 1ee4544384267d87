use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};

use shoot_config::model::{INVESTIGATION_TIMEOUT_RANGE, INVESTIGATION_TURNS_RANGE};

use crate::state::AppState;

pub async fn list(state: web::Data<AppState>) -> impl Responder {
    let config = state.config();
    let agents: Vec<Value> = config
        .agents
        .values()
        .map(|agent| {
            json!({
                "name": agent.id(),
                "description": agent.profile.description,
                "subagents": agent.collectors,
                "response_schema": agent.response_schema,
                "request_variables": agent.request_variables,
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({ "agents": agents }))
}

pub async fn schema(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();
    let config = state.config();

    let Some(agent) = config.agent(&name) else {
        return HttpResponse::NotFound().json(json!({
            "error": format!("Agent '{}' not found", name),
            "available": config.agent_names(),
        }));
    };

    match config.schema_for(agent) {
        Some(schema) => HttpResponse::Ok().json(json!({
            "agent": name,
            "schema": schema.document,
            "format": schema.mode.as_str(),
            "description": schema.description.clone().unwrap_or_default(),
        })),
        None => HttpResponse::Ok().json(json!({
            "agent": name,
            "schema": Value::Null,
            "message": "No response schema configured for this agent",
        })),
    }
}

/// Shape of the query endpoint's request and response bodies.
pub async fn api_schema() -> impl Responder {
    HttpResponse::Ok().json(api_document())
}

fn usage_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prompt_tokens": { "type": "integer" },
            "completion_tokens": { "type": "integer" },
            "total_tokens": { "type": "integer" }
        }
    })
}

fn api_document() -> Value {
    let metrics = json!({
        "type": "object",
        "properties": {
            "duration_ms": { "type": "integer" },
            "num_turns": { "type": "integer" },
            "total_cost_usd": { "type": "number" },
            "usage": usage_schema(),
            "breakdown": {
                "type": "object",
                "description": "Per-agent metrics keyed by agent id",
                "additionalProperties": { "type": "object" }
            }
        }
    });

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Investigation",
        "request": {
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "agent": {
                    "type": "string",
                    "description": "Required when more than one agent is configured"
                },
                "variables": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "timeout_seconds": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": INVESTIGATION_TIMEOUT_RANGE.1
                },
                "max_turns": {
                    "description": "Replaces the agent's turn budget",
                    "type": "integer",
                    "minimum": 1,
                    "maximum": INVESTIGATION_TURNS_RANGE.1
                }
            }
        },
        "response": {
            "type": "object",
            "required": ["result", "agent", "request_id", "metrics"],
            "properties": {
                "result": {
                    "description": "Text, or the validated object for machine-format agents",
                    "type": ["string", "object"]
                },
                "agent": { "type": "string" },
                "request_id": { "type": "string" },
                "truncated": { "type": "boolean" },
                "metrics": metrics
            }
        },
        "error": {
            "type": "object",
            "required": ["error"],
            "properties": {
                "error": { "type": "string" },
                "request_id": { "type": "string" },
                "available": { "type": "array", "items": { "type": "string" } }
            }
        }
    })
}
