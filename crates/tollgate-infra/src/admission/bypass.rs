//! Bypass admission control.
//!
//! Admits everything without touching the store. Strictly for controlled
//! benchmarking of the surrounding plumbing; enabled by `BYPASS_LIMITER`.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use tollgate_core::domain::{
    AdmissionGrant, AdmissionRequest, AdmissionVerdict, CredentialLimits, WindowUsage,
};
use tollgate_core::error::AdmissionError;
use tollgate_core::ports::AdmissionControl;

pub struct BypassAdmission;

#[async_trait]
impl AdmissionControl for BypassAdmission {
    async fn try_admit(
        &self,
        _credential: &str,
        _limits: CredentialLimits,
        _request: AdmissionRequest,
    ) -> Result<AdmissionVerdict, AdmissionError> {
        let submit_second = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);

        Ok(AdmissionVerdict::Allowed(AdmissionGrant {
            submit_second,
            usage: WindowUsage::default(),
        }))
    }

    async fn reconcile_output(
        &self,
        _credential: &str,
        _submit_second: u64,
        _delta: i64,
    ) -> Result<(), AdmissionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_even_zero_limits() {
        let backend = BypassAdmission;
        let limits = CredentialLimits {
            rpm: 0,
            input_tpm: 0,
            output_tpm: 0,
        };
        let verdict = backend
            .try_admit(
                "anyone",
                limits,
                AdmissionRequest {
                    input_tokens: 10,
                    output_token_estimate: 10,
                },
            )
            .await
            .unwrap();
        assert!(verdict.is_allowed());
    }
}
