use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::handlers;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Registers every route on `cfg`; shared by the server and the tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health))
        .route("/ready", web::get().to(handlers::health::ready))
        .route("/agents", web::get().to(handlers::agents::list))
        .route("/agents/{name}/schema", web::get().to(handlers::agents::schema))
        .route("/schema", web::get().to(handlers::agents::api_schema))
        .route("/", web::post().to(handlers::query::handler))
        .route("/stream", web::post().to(handlers::stream::handler));
}

pub async fn run_server(settings: ServerSettings, state: AppState) -> io::Result<()> {
    log::info!(
        "Listening on {}:{} with {} agent(s): {}",
        settings.host,
        settings.port,
        state.config().agents.len(),
        state.config().agent_names().join(", ")
    );

    let state = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(configure_routes)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await
}
