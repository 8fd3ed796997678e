//! HTTP endpoint that runs one collection cycle per authorized request.

pub mod auth;

use actix_web::http::header::AUTHORIZATION;
use actix_web::middleware::Logger;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collector::Collector;
pub use auth::{SIGNATURE_HEADER, TriggerAuth};

pub struct TriggerState {
    pub collector: Arc<Collector>,
    pub auth: TriggerAuth,
}

/// Registers the trigger at `path` (GET and POST) and `GET /health`.
pub fn configure(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.route(path, web::post().to(trigger))
        .route(path, web::get().to(trigger))
        .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[tracing::instrument(skip_all, fields(path = %req.path()))]
async fn trigger(req: HttpRequest, body: web::Bytes, state: web::Data<TriggerState>) -> HttpResponse {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let now_secs = state.collector.clock().now_ms().div_euclid(1000);

    if let Err(e) = state.auth.authorize(
        header(SIGNATURE_HEADER),
        header(AUTHORIZATION.as_str()),
        &body,
        now_secs,
    ) {
        warn!(error = %e, "Rejected trigger");
        return HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "unauthorized",
        }));
    }

    let report = state.collector.run_cycle().await;
    if report.success {
        HttpResponse::Ok().json(report)
    } else {
        HttpResponse::InternalServerError().json(report)
    }
}

/// Serves the trigger until the server is stopped.
pub async fn serve(listen_address: &str, path: String, state: TriggerState) -> std::io::Result<()> {
    if !state.auth.is_configured() {
        warn!("No trigger credentials configured; every request will be rejected");
    }

    let state = web::Data::new(state);
    info!(listen_address, path = %path, "Starting trigger server");

    HttpServer::new(move || {
        let path = path.clone();
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(move |cfg| configure(cfg, &path))
    })
    .bind(listen_address)?
    .run()
    .await
}
