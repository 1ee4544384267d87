use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use shoot_loop::EventSink;

use crate::handlers::{investigation_error_response, QueryBody};
use crate::state::AppState;

/// Runs one investigation and answers with the result envelope.
///
/// The run is cancelled if the client goes away: actix drops this future,
/// and with it the guard holding the request's token.
pub async fn handler(state: web::Data<AppState>, body: web::Json<QueryBody>) -> impl Responder {
    let request = match body.into_inner().into_request() {
        Ok(request) => request,
        Err(response) => return response,
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let result = state
        .investigator
        .investigate(request, EventSink::disabled(), cancel)
        .await;
    guard.disarm();

    match result {
        Ok(outcome) => {
            log::info!(
                "[{}] Investigation by '{}' completed in {}ms (${:.6})",
                outcome.request_id,
                outcome.agent,
                outcome.metrics.duration_ms,
                outcome.metrics.total_cost_usd
            );
            let mut body = json!({
                "result": outcome.response.envelope_value(),
                "agent": outcome.agent,
                "request_id": outcome.request_id,
                "metrics": outcome.metrics,
            });
            if outcome.truncated {
                body["truncated"] = json!(true);
            }
            HttpResponse::Ok().json(body)
        }
        Err(failure) => investigation_error_response(&failure),
    }
}
