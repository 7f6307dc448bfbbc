use std::collections::BTreeMap;

use super::{AdmissionGrant, AdmissionRequest, AdmissionVerdict, CredentialLimits, Dimension, WindowUsage};

/// Sliding-window accounting for one credential.
///
/// This is the reference state machine for the admission semantics: per-second
/// buckets, an incrementally maintained aggregate per dimension, lazy pruning
/// of expired buckets, and post-hoc reconciliation of the output dimension.
/// The Redis admission script implements exactly these transitions server-side;
/// the in-memory backend drives this type directly.
///
/// All operations take `now_ms` explicitly so the semantics stay deterministic
/// and testable; callers supply whatever clock is authoritative for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    window_seconds: u64,
    dimensions: [DimensionWindow; 3],
}

/// One (credential, dimension) slice of the window. The ordered bucket keys
/// double as the index that drives pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DimensionWindow {
    buckets: BTreeMap<u64, u64>,
    total: u64,
}

impl DimensionWindow {
    /// Drops every bucket with `second <= cutoff` and subtracts the drained
    /// amount from the aggregate. The aggregate saturates at zero to absorb
    /// reconciliation underflow.
    fn prune(&mut self, cutoff: u64) {
        let live = self.buckets.split_off(&(cutoff + 1));
        let drained: u64 = self.buckets.values().sum();
        self.buckets = live;
        self.total = self.total.saturating_sub(drained);
    }

    fn record(&mut self, second: u64, amount: u64) {
        *self.buckets.entry(second).or_insert(0) += amount;
        self.total += amount;
    }

    fn oldest_bucket(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }
}

impl SlidingWindow {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window_seconds: window_seconds.max(1),
            dimensions: Default::default(),
        }
    }

    /// Atomic prune-check-admit. Denials report the first violating dimension
    /// in (req, in, out) order and mutate nothing.
    pub fn admit(
        &mut self,
        now_ms: u64,
        limits: CredentialLimits,
        request: AdmissionRequest,
    ) -> AdmissionVerdict {
        self.prune(now_ms);

        let second = now_ms / 1000;
        let amounts = [1, request.input_tokens, request.output_token_estimate];

        for (index, dimension) in Dimension::ALL.into_iter().enumerate() {
            let limit = limits.limit_for(dimension);
            let projected = self.dimensions[index].total.saturating_add(amounts[index]);
            if limit == 0 || projected > limit {
                return AdmissionVerdict::Denied {
                    dimension,
                    retry_after_ms: self.retry_after_ms(index, now_ms),
                };
            }
        }

        for (index, amount) in amounts.into_iter().enumerate() {
            self.dimensions[index].record(second, amount);
        }

        AdmissionVerdict::Allowed(AdmissionGrant {
            submit_second: second,
            usage: self.usage(),
        })
    }

    /// Adjusts the output bucket recorded at `submit_second` by
    /// `actual − estimated`. A bucket that has already expired is left alone;
    /// bucket and aggregate both clamp at zero.
    pub fn reconcile_output(&mut self, submit_second: u64, delta: i64) {
        let output = &mut self.dimensions[2];
        let Some(bucket) = output.buckets.get_mut(&submit_second) else {
            return;
        };

        let before = *bucket;
        let updated = before.saturating_add_signed(delta);
        *bucket = updated;

        if updated >= before {
            output.total = output.total.saturating_add(updated - before);
        } else {
            output.total = output.total.saturating_sub(before - updated);
        }
    }

    /// Drops every bucket older than the window. Safe to call at any time;
    /// admission always prunes first, so an extra call is a no-op.
    pub fn prune(&mut self, now_ms: u64) {
        let second = now_ms / 1000;
        if second < self.window_seconds {
            return;
        }
        let cutoff = second - self.window_seconds;
        for dimension in &mut self.dimensions {
            dimension.prune(cutoff);
        }
    }

    /// Current aggregates across live buckets.
    pub fn usage(&self) -> WindowUsage {
        WindowUsage {
            requests: self.dimensions[0].total,
            input_tokens: self.dimensions[1].total,
            output_tokens: self.dimensions[2].total,
        }
    }

    /// True once every bucket has been pruned; the owner can drop the whole
    /// window and let the credential's footprint collapse to nothing.
    pub fn is_empty(&self) -> bool {
        self.dimensions.iter().all(|d| d.buckets.is_empty())
    }

    /// `1000 − (now_ms mod 1000)` carries the caller to the next second
    /// boundary; full seconds are added until the oldest bucket of the
    /// violating dimension ages out. With an empty index (only possible under
    /// a zero limit) the wait degenerates to the sub-second remainder.
    fn retry_after_ms(&self, index: usize, now_ms: u64) -> u64 {
        let second = now_ms / 1000;
        let mut retry = 1000 - now_ms % 1000;
        if let Some(oldest) = self.dimensions[index].oldest_bucket() {
            let expires_at = oldest + self.window_seconds;
            retry += expires_at.saturating_sub(second + 1) * 1000;
        }
        retry
    }
}
