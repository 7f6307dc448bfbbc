//! Per-second admission counters.
//!
//! The minimum observability floor: three atomic counters drained once per
//! second by a background task that logs a single structured line whenever
//! the node saw traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Metrics {
    success: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn drain(&self) -> (u64, u64, u64) {
        (
            self.success.swap(0, Ordering::Relaxed),
            self.throttled.swap(0, Ordering::Relaxed),
            self.failed.swap(0, Ordering::Relaxed),
        )
    }

    /// Spawn the once-per-second reporter. Runs until the process exits.
    pub fn spawn_reporter(self: Arc<Self>, node_id: String) {
        let metrics = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let (success, throttled, failed) = metrics.drain();
                let total = success + throttled + failed;
                if total > 0 {
                    tracing::info!(
                        node = %node_id,
                        throughput = total,
                        success,
                        throttled,
                        failed,
                        "throughput"
                    );
                }
            }
        });
    }
}
