//! # Tollgate Gateway
//!
//! One node of the horizontally scaled fleet: an OpenAI-compatible
//! chat-completions endpoint where every request passes fleet-wide
//! admission control before a mock completion is generated.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod metrics;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&telemetry::TelemetryConfig::from_env());

    let config = AppConfig::from_env();
    tracing::info!(
        node_id = %config.node_id,
        host = %config.host,
        port = config.port,
        window_seconds = config.window_seconds,
        bypass = config.bypass_limiter,
        "Starting Tollgate gateway"
    );

    let state = AppState::new(&config).await?;
    state.metrics.clone().spawn_reporter(config.node_id.clone());

    #[cfg(unix)]
    spawn_sighup_reload(state.credentials.clone());

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

/// Re-reads the credentials document on SIGHUP and atomically publishes the
/// new snapshot. A failed reload keeps the current snapshot.
#[cfg(unix)]
fn spawn_sighup_reload(credentials: std::sync::Arc<dyn tollgate_core::ports::CredentialStore>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler for registry reload");
                return;
            }
        };

        loop {
            if hangup.recv().await.is_none() {
                break;
            }
            match credentials.reload() {
                Ok(count) => {
                    tracing::info!(credentials = count, "Reloaded credential registry");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Registry reload failed, keeping current snapshot");
                }
            }
        }
    });
}
