use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{web, HttpResponse, Responder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shoot_core::RunEvent;
use shoot_loop::EventSink;

use crate::handlers::{agent_error_response, QueryBody};
use crate::state::AppState;

const EVENT_BUFFER: usize = 100;
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

fn sse_frame(event: &RunEvent) -> Option<Bytes> {
    serde_json::to_string(event)
        .ok()
        .map(|json| Bytes::from(format!("data: {}\n\n", json)))
}

/// Streams an investigation's events as server-sent events, closing after
/// the `finished` or `error` event.
pub async fn handler(state: web::Data<AppState>, body: web::Json<QueryBody>) -> impl Responder {
    let mut request = match body.into_inner().into_request() {
        Ok(request) => request,
        Err(response) => return response,
    };
    let request_id = uuid::Uuid::new_v4().to_string();
    request.request_id = Some(request_id.clone());

    // Resolution errors are reported as plain HTTP errors, before streaming.
    if let Err(error) = state.investigator.resolve_agent(request.agent.as_deref()) {
        return agent_error_response(&error);
    }

    let (event_tx, mut event_rx) = mpsc::channel::<RunEvent>(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let investigator = state.investigator.clone();
    tokio::spawn(async move {
        if let Err(failure) = investigator
            .investigate(request, EventSink::new(event_tx), cancel)
            .await
        {
            log::warn!("Streaming investigation failed: {}", failure);
        }
    });

    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((header::CONNECTION, "keep-alive"))
        .append_header(("X-Accel-Buffering", "no"))
        .append_header((REQUEST_ID_HEADER, request_id))
        .streaming(async_stream::stream! {
            // Dropping the body (client disconnect) cancels the run.
            let _guard = guard;
            while let Some(event) = event_rx.recv().await {
                let last = event.is_final();
                if let Some(frame) = sse_frame(&event) {
                    yield Ok::<_, actix_web::Error>(frame);
                }
                if last {
                    break;
                }
            }
        })
}
