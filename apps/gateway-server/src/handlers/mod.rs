//! API route handlers.

mod chat;
mod health;

use actix_web::web;

/// Configure all routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(health::healthz)).route(
        "/v1/chat/completions",
        web::post().to(chat::chat_completions),
    );
}
