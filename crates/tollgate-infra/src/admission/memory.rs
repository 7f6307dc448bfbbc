//! In-memory admission control.
//!
//! Drives the same sliding-window state machine the Redis script implements,
//! behind a single process-local mutex. Useful for single-node deployments
//! and for tests; limits are per-process, not fleet-wide.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tollgate_core::domain::{
    AdmissionRequest, AdmissionVerdict, CredentialLimits, SlidingWindow,
};
use tollgate_core::error::AdmissionError;
use tollgate_core::ports::AdmissionControl;

pub struct InMemoryAdmission {
    window_seconds: u64,
    credentials: Mutex<HashMap<String, SlidingWindow>>,
}

impl InMemoryAdmission {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window_seconds: window_seconds.max(1),
            credentials: Mutex::new(HashMap::new()),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Stand-in for the store's TTL expiry: every call prunes all windows and
/// drops the empty ones, so an idle credential's footprint is gone by the
/// next time any traffic reaches this backend.
fn sweep_expired(credentials: &mut HashMap<String, SlidingWindow>, now_ms: u64) {
    credentials.retain(|_, window| {
        window.prune(now_ms);
        !window.is_empty()
    });
}

#[async_trait]
impl AdmissionControl for InMemoryAdmission {
    async fn try_admit(
        &self,
        credential: &str,
        limits: CredentialLimits,
        request: AdmissionRequest,
    ) -> Result<AdmissionVerdict, AdmissionError> {
        let now_ms = unix_millis();
        let mut credentials = self.credentials.lock().await;
        sweep_expired(&mut credentials, now_ms);

        let window = credentials
            .entry(credential.to_string())
            .or_insert_with(|| SlidingWindow::new(self.window_seconds));
        let verdict = window.admit(now_ms, limits, request);

        if window.is_empty() {
            credentials.remove(credential);
        }

        Ok(verdict)
    }

    async fn reconcile_output(
        &self,
        credential: &str,
        submit_second: u64,
        delta: i64,
    ) -> Result<(), AdmissionError> {
        let mut credentials = self.credentials.lock().await;
        sweep_expired(&mut credentials, unix_millis());

        if let Some(window) = credentials.get_mut(credential) {
            window.reconcile_output(submit_second, delta);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tollgate_core::domain::Dimension;

    fn request() -> AdmissionRequest {
        AdmissionRequest {
            input_tokens: 1,
            output_token_estimate: 1,
        }
    }

    #[tokio::test]
    async fn enforces_request_limit_per_credential() {
        let backend = InMemoryAdmission::new(60);
        let limits = CredentialLimits {
            rpm: 2,
            input_tpm: 1_000,
            output_tpm: 1_000,
        };

        assert!(backend
            .try_admit("alpha", limits, request())
            .await
            .unwrap()
            .is_allowed());
        assert!(backend
            .try_admit("alpha", limits, request())
            .await
            .unwrap()
            .is_allowed());

        match backend.try_admit("alpha", limits, request()).await.unwrap() {
            AdmissionVerdict::Denied { dimension, .. } => assert_eq!(dimension, Dimension::Req),
            AdmissionVerdict::Allowed(_) => panic!("third request must be denied"),
        }

        // Credentials do not share windows.
        assert!(backend
            .try_admit("beta", limits, request())
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn concurrent_contenders_admit_exactly_one() {
        let backend = Arc::new(InMemoryAdmission::new(60));
        let limits = CredentialLimits {
            rpm: 1,
            input_tpm: 1_000,
            output_tpm: 1_000,
        };

        let contenders: Vec<_> = (0..64)
            .map(|_| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend
                        .try_admit("contended", limits, request())
                        .await
                        .unwrap()
                        .is_allowed()
                })
            })
            .collect();

        let mut admitted = 0;
        for contender in contenders {
            if contender.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn denied_only_credential_leaves_no_state() {
        let backend = InMemoryAdmission::new(60);
        let limits = CredentialLimits {
            rpm: 0,
            input_tpm: 0,
            output_tpm: 0,
        };

        let verdict = backend.try_admit("ghost", limits, request()).await.unwrap();
        assert!(!verdict.is_allowed());
        assert!(backend.credentials.lock().await.is_empty());
    }

    #[tokio::test]
    async fn idle_credential_state_is_swept_on_later_traffic() {
        let backend = InMemoryAdmission::new(1);
        let limits = CredentialLimits {
            rpm: 10,
            input_tpm: 1_000,
            output_tpm: 1_000,
        };

        assert!(backend
            .try_admit("idle", limits, request())
            .await
            .unwrap()
            .is_allowed());
        assert!(backend.credentials.lock().await.contains_key("idle"));

        // Let the one-second window pass, then touch a different credential.
        tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;
        assert!(backend
            .try_admit("active", limits, request())
            .await
            .unwrap()
            .is_allowed());

        let credentials = backend.credentials.lock().await;
        assert!(!credentials.contains_key("idle"));
        assert!(credentials.contains_key("active"));
    }

    #[tokio::test]
    async fn reconcile_unknown_credential_is_noop() {
        let backend = InMemoryAdmission::new(60);
        backend.reconcile_output("nobody", 0, -10).await.unwrap();
        assert!(backend.credentials.lock().await.is_empty());
    }
}
