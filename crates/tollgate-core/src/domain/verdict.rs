use serde::Serialize;

use super::Dimension;

/// What one request asks the limiter for. The request dimension is implicit:
/// every admission consumes exactly one request slot, even when both token
/// counts are zero.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest {
    pub input_tokens: u64,
    pub output_token_estimate: u64,
}

/// Post-admit aggregates across the live window, echoed back on every grant
/// for logging and diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WindowUsage {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A granted admission. `submit_second` identifies the output bucket the
/// caller must reconcile once the actual completion size is known.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionGrant {
    pub submit_second: u64,
    pub usage: WindowUsage,
}

/// Outcome of one atomic admission evaluation.
#[derive(Debug, Clone, Copy)]
pub enum AdmissionVerdict {
    Allowed(AdmissionGrant),
    Denied {
        /// First violating dimension in (req, in, out) order.
        dimension: Dimension,
        /// Shortest wait until at least one bucket in that dimension expires.
        retry_after_ms: u64,
    },
}

impl AdmissionVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionVerdict::Allowed(_))
    }
}
