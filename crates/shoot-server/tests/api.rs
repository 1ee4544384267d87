//! HTTP front door tests over scripted model and tool doubles.

mod support;

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App, Error};
use serde_json::{json, Value};

use shoot_server::{configure_routes, AppState};
use support::{app_state, text_reply, tool_reply, ScriptedLlm, Step};

async fn setup_test_app(
    state: AppState,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await
}

fn query(body: Value) -> Request {
    test::TestRequest::post().uri("/").set_json(body).to_request()
}

#[actix_web::test]
async fn health_is_healthy() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn shallow_readiness_lists_agents() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["agents"], json!(["report", "triage"]));
}

#[actix_web::test]
async fn deep_readiness_reports_failed_servers() {
    let (state, _dir) = app_state(ScriptedLlm::new().unhealthy());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/ready?deep=true").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["failed_servers"][0]["server"], "kubernetes");
    assert_eq!(body["model"]["ok"], false);
}

#[actix_web::test]
async fn agents_are_listed_with_their_contract() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/agents").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);

    let triage = agents.iter().find(|a| a["name"] == "triage").unwrap();
    assert_eq!(triage["subagents"], json!(["kube"]));
    assert_eq!(triage["request_variables"], json!(["namespace"]));
    assert!(triage["response_schema"].is_null());

    let report = agents.iter().find(|a| a["name"] == "report").unwrap();
    assert_eq!(report["response_schema"], "diagnostic");
}

#[actix_web::test]
async fn agent_schema_endpoint() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/agents/report/schema").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["format"], "json");
    assert_eq!(body["description"], "Diagnostic report");
    assert_eq!(body["schema"]["required"], json!(["summary", "severity"]));

    let req = test::TestRequest::get().uri("/agents/triage/schema").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["schema"].is_null());
    assert!(body["message"].is_string());

    let req = test::TestRequest::get().uri("/agents/ghost/schema").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn missing_query_is_bad_request() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let resp = test::call_service(&app, query(json!({ "agent": "triage" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn agent_must_be_named_when_several_exist() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let resp = test::call_service(&app, query(json!({ "query": "why" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["available"], json!(["report", "triage"]));
}

#[actix_web::test]
async fn unknown_agent_is_not_found() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let resp = test::call_service(&app, query(json!({ "query": "why", "agent": "ghost" }))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["request_id"].is_string());
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[actix_web::test]
async fn text_investigation_returns_envelope() {
    let llm = ScriptedLlm::new()
        .script(
            "You are triage",
            vec![
                Step::Reply(tool_reply("c1", "kube", r#"{"query":"list namespaces"}"#)),
                Step::Reply(text_reply("Three namespaces, payments looks suspicious.")),
            ],
        )
        .script(
            "You are kube",
            vec![
                Step::Reply(tool_reply("k1", "mcp__kubernetes__namespaces_list", "{}")),
                Step::Reply(text_reply("default, kube-system, payments")),
            ],
        );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let resp = test::call_service(
        &app,
        query(json!({
            "query": "what namespaces exist?",
            "agent": "triage",
            "variables": { "namespace": "payments" }
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["result"], "Three namespaces, payments looks suspicious.");
    assert_eq!(body["agent"], "triage");
    assert!(body["request_id"].is_string());
    assert_eq!(body["metrics"]["usage"]["prompt_tokens"], 40);
    assert_eq!(body["metrics"]["usage"]["completion_tokens"], 20);
    assert!(body["metrics"]["breakdown"]["kube"].is_object());
    assert!(body["metrics"]["breakdown"]["triage"].is_object());
    assert!(body.get("truncated").is_none());
}

#[actix_web::test]
async fn machine_agent_returns_object_result() {
    let llm = ScriptedLlm::new().script(
        "You are report",
        vec![Step::Reply(text_reply(
            "```json\n{\"summary\": \"all good\", \"severity\": \"low\"}\n```",
        ))],
    );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let body: Value = test::call_and_read_body_json(
        &app,
        query(json!({ "query": "status?", "agent": "report" })),
    )
    .await;
    assert_eq!(body["result"]["summary"], "all good");
    assert_eq!(body["result"]["severity"], "low");
}

#[actix_web::test]
async fn schema_mismatch_is_unprocessable() {
    let llm = ScriptedLlm::new().script(
        "You are report",
        vec![Step::Reply(text_reply(r#"{"summary": "no severity"}"#))],
    );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let resp = test::call_service(&app, query(json!({ "query": "status?", "agent": "report" }))).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("severity"));
    assert!(body["metrics"].is_object());
}

#[actix_web::test]
async fn timed_out_run_is_gateway_timeout() {
    let llm = ScriptedLlm::new().script("You are triage", vec![Step::Hang]);
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let resp = test::call_service(
        &app,
        query(json!({ "query": "slow", "agent": "triage", "timeout_seconds": 1 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["request_id"].is_string());
}

#[actix_web::test]
async fn adapter_failure_is_internal_error() {
    let llm = ScriptedLlm::new().script(
        "You are triage",
        vec![Step::Fail("overloaded"), Step::Fail("overloaded")],
    );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let resp = test::call_service(&app, query(json!({ "query": "why", "agent": "triage" }))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("overloaded"));
    assert_eq!(body["agent"], "triage");
}

fn sse_events(body: &[u8]) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[actix_web::test]
async fn stream_ends_with_finished_event() {
    let llm = ScriptedLlm::new().script(
        "You are triage",
        vec![Step::Reply(text_reply("Nothing is wrong."))],
    );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let req = test::TestRequest::post()
        .uri("/stream")
        .set_json(json!({ "query": "check", "agent": "triage" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let request_id = resp
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let body = test::read_body(resp).await;
    let events = sse_events(&body);
    assert_eq!(events.first().unwrap()["type"], "started");
    let last = events.last().unwrap();
    assert_eq!(last["type"], "finished");
    assert_eq!(last["request_id"], request_id.as_str());
    assert_eq!(last["result"], "Nothing is wrong.");
    assert!(events.iter().any(|e| e["type"] == "text"));
}

#[actix_web::test]
async fn stream_reports_failure_as_error_event() {
    let llm = ScriptedLlm::new().script(
        "You are triage",
        vec![Step::Fail("down"), Step::Fail("down")],
    );
    let (state, _dir) = app_state(llm);
    let app = setup_test_app(state).await;

    let req = test::TestRequest::post()
        .uri("/stream")
        .set_json(json!({ "query": "check", "agent": "triage" }))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let events = sse_events(&body);
    let last = events.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["message"].as_str().unwrap().contains("down"));
}

#[actix_web::test]
async fn stream_rejects_unknown_agent_before_streaming() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::post()
        .uri("/stream")
        .set_json(json!({ "query": "check", "agent": "ghost" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn api_schema_describes_query() {
    let (state, _dir) = app_state(ScriptedLlm::new());
    let app = setup_test_app(state).await;

    let req = test::TestRequest::get().uri("/schema").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["request"]["required"], json!(["query"]));
    assert_eq!(body["request"]["properties"]["max_turns"]["maximum"], 50);
}
