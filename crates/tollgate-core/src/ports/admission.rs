//! Admission control port.

use async_trait::async_trait;

use crate::domain::{AdmissionRequest, AdmissionVerdict, CredentialLimits};
use crate::error::AdmissionError;

/// Fleet-wide admission control - abstraction over the shared-store script
/// backend and its single-node stand-ins.
///
/// Implementations must evaluate `try_admit` atomically per credential: the
/// prune, the three limit checks and the recording happen as one indivisible
/// step against shared state, so two nodes can never both spend the last slot.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Evaluate-and-record one request against the credential's limits.
    ///
    /// Returns `Ok(Denied { .. })` for an over-limit request; `Err` is
    /// reserved for infrastructure faults (store unreachable, script broken),
    /// which callers must fail closed on.
    async fn try_admit(
        &self,
        credential: &str,
        limits: CredentialLimits,
        request: AdmissionRequest,
    ) -> Result<AdmissionVerdict, AdmissionError>;

    /// True up the output bucket recorded at `submit_second` by
    /// `actual − estimated` tokens. Never denies; a bucket that already
    /// expired is left alone.
    async fn reconcile_output(
        &self,
        credential: &str,
        submit_second: u64,
        delta: i64,
    ) -> Result<(), AdmissionError>;
}
