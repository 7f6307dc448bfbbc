//! Application state - shared across all handlers.

use std::sync::Arc;

use tollgate_core::ports::{AdmissionControl, CredentialStore};
use tollgate_infra::{ApiKeyRegistry, BypassAdmission, RedisAdmission, RedisAdmissionConfig};

use crate::config::AppConfig;
use crate::metrics::Metrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub node_id: String,
    pub credentials: Arc<dyn CredentialStore>,
    pub admission: Arc<dyn AdmissionControl>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Build the application state with the configured backends.
    ///
    /// Fails hard when the credentials document cannot be loaded or the
    /// shared store cannot be reached: a node that starts without either
    /// would have to fail every request anyway.
    pub async fn new(config: &AppConfig) -> std::io::Result<Self> {
        let registry = ApiKeyRegistry::load(&config.api_keys_file)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let admission: Arc<dyn AdmissionControl> = if config.bypass_limiter {
            tracing::warn!("BYPASS_LIMITER set - admitting everything without the store");
            Arc::new(BypassAdmission)
        } else {
            let backend = RedisAdmission::connect(RedisAdmissionConfig {
                url: config.redis_url.clone(),
                window_seconds: config.window_seconds,
                admit_deadline: config.admit_deadline,
                reconcile_deadline: config.reconcile_deadline,
                ..RedisAdmissionConfig::default()
            })
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?;
            Arc::new(backend)
        };

        tracing::info!(node_id = %config.node_id, "Application state initialized");

        Ok(Self {
            node_id: config.node_id.clone(),
            credentials: Arc::new(registry),
            admission,
            metrics: Arc::new(Metrics::new()),
        })
    }
}
