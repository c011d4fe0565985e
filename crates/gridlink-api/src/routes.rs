//! Route configuration for the command surface.

use actix_web::{web, HttpResponse};

use crate::handlers;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route(
            "/command/get_history",
            web::post().to(handlers::get_history::handle),
        )
        .route(
            "/command/subscribe",
            web::post().to(handlers::subscribe::handle),
        )
        .route(
            "/command/unsubscribe",
            web::post().to(handlers::unsubscribe::handle),
        );
}
