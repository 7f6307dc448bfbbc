//! Domain-level error types.

use thiserror::Error;

/// Failures talking to the shared admission store.
///
/// The limiter core never recovers internally; it classifies and returns.
/// `StoreUnavailable` must fail closed — a node that cannot reach the store
/// cannot admit without breaking fleet-wide limits.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("shared store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("admission script failed: {0}")]
    Script(String),
}

/// Failures loading the credentials document.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read credentials file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse credentials file {path}: {message}")]
    Parse { path: String, message: String },
}
