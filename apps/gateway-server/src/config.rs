//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Gateway node configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Opaque identifier embedded in responses and health payloads.
    pub node_id: String,
    pub redis_url: String,
    /// Sliding window length `W`, at least one second.
    pub window_seconds: u64,
    /// Path to the credentials document.
    pub api_keys_file: String,
    /// Short-circuit admission to ALLOW without touching the store.
    /// Benchmarking only.
    pub bypass_limiter: bool,
    pub admit_deadline: Duration,
    pub reconcile_deadline: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            node_id: env::var("NODE_ID").unwrap_or_else(|_| "tollgate-node".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            window_seconds: env::var("WINDOW_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|w: u64| w.max(1))
                .unwrap_or(60),
            api_keys_file: env::var("API_KEYS_FILE")
                .unwrap_or_else(|_| "api_keys.yaml".to_string()),
            bypass_limiter: env::var("BYPASS_LIMITER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            admit_deadline: Duration::from_millis(
                env::var("ADMIT_DEADLINE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
            ),
            reconcile_deadline: Duration::from_millis(
                env::var("RECONCILE_DEADLINE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(250),
            ),
        }
    }
}
