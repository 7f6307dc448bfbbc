//! Redis admission backend.
//!
//! The entire prune-check-admit sequence runs inside one server-side Lua
//! evaluation, which is what removes the check-then-set race without any
//! client-side locking: every node ships only arguments and receives only the
//! verdict, so fleet size does not affect correctness. Reconciliation is a
//! second, smaller atomic evaluation against the output dimension only.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use tollgate_core::domain::{
    AdmissionGrant, AdmissionRequest, AdmissionVerdict, CredentialLimits, Dimension, WindowUsage,
};
use tollgate_core::error::AdmissionError;
use tollgate_core::ports::AdmissionControl;

/// Keys per (credential, dimension): `idx` is a sorted set of live bucket
/// seconds, `buckets` maps second to count, `total` holds the aggregate.
/// All three share a TTL of window + slack, refreshed on every admit, so an
/// idle credential's footprint collapses to nothing.
const TTL_SLACK_SECONDS: u64 = 5;

/// Atomic prune-check-admit.
///
/// KEYS: idx/buckets/total for req, then in, then out (nine keys).
/// ARGV: window_seconds, rpm, input_tpm, output_tpm, input_tokens,
///       output_token_estimate, ttl_seconds.
///
/// Uses the store's own clock (`TIME`); node clocks are never trusted.
/// Replies `{1, submit_second, used_req, used_in, used_out}` on allow and
/// `{0, dimension_flag, retry_after_ms}` on deny.
const ADMIT_SCRIPT: &str = r#"
local window = tonumber(ARGV[1])
local limits = {tonumber(ARGV[2]), tonumber(ARGV[3]), tonumber(ARGV[4])}
local amounts = {1, tonumber(ARGV[5]), tonumber(ARGV[6])}
local ttl = tonumber(ARGV[7])

local time = redis.call('TIME')
local now_ms = time[1] * 1000 + math.floor(time[2] / 1000)
local second = math.floor(now_ms / 1000)
local cutoff = second - window

local function prune(idx, buckets, total)
    local expired = redis.call('ZRANGEBYSCORE', idx, 0, cutoff)
    if #expired > 0 then
        local drained = 0
        for _, bucket in ipairs(expired) do
            local amount = redis.call('HGET', buckets, bucket)
            if amount then
                drained = drained + tonumber(amount)
                redis.call('HDEL', buckets, bucket)
            end
        end
        redis.call('ZREMRANGEBYSCORE', idx, 0, cutoff)
        redis.call('DECRBY', total, drained)
    end
    local current = tonumber(redis.call('GET', total) or '0')
    if current < 0 then
        redis.call('SET', total, '0')
        current = 0
    end
    return current
end

local used = {}
for d = 1, 3 do
    used[d] = prune(KEYS[(d-1)*3 + 1], KEYS[(d-1)*3 + 2], KEYS[(d-1)*3 + 3])
end

for d = 1, 3 do
    if limits[d] == 0 or used[d] + amounts[d] > limits[d] then
        local retry = 1000 - (now_ms % 1000)
        local oldest = redis.call('ZRANGE', KEYS[(d-1)*3 + 1], 0, 0)
        if #oldest > 0 then
            local gap = tonumber(oldest[1]) + window - second - 1
            if gap > 0 then
                retry = retry + gap * 1000
            end
        end
        return {0, d, retry}
    end
end

for d = 1, 3 do
    local idx = KEYS[(d-1)*3 + 1]
    local buckets = KEYS[(d-1)*3 + 2]
    local total = KEYS[(d-1)*3 + 3]
    redis.call('ZADD', idx, second, second)
    redis.call('HINCRBY', buckets, second, amounts[d])
    redis.call('INCRBY', total, amounts[d])
    redis.call('EXPIRE', idx, ttl)
    redis.call('EXPIRE', buckets, ttl)
    redis.call('EXPIRE', total, ttl)
end

return {1, second, used[1] + amounts[1], used[2] + amounts[2], used[3] + amounts[3]}
"#;

/// Atomic output reconciliation.
///
/// KEYS: buckets and total of the out dimension.
/// ARGV: submit_second, delta (actual − estimated, may be negative).
///
/// A bucket that has already expired is left alone; bucket and aggregate
/// clamp at zero. Replies 1 when applied, 0 when the bucket was gone.
const RECONCILE_SCRIPT: &str = r#"
local second = ARGV[1]
local delta = tonumber(ARGV[2])

local existing = redis.call('HGET', KEYS[1], second)
if not existing then
    return 0
end

local updated = tonumber(existing) + delta
if updated < 0 then
    updated = 0
end
redis.call('HSET', KEYS[1], second, updated)

local applied = updated - tonumber(existing)
if applied ~= 0 then
    local total = redis.call('INCRBY', KEYS[2], applied)
    if total < 0 then
        redis.call('SET', KEYS[2], '0')
    end
end
return 1
"#;

/// Redis admission configuration.
#[derive(Debug, Clone)]
pub struct RedisAdmissionConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Sliding window length in seconds.
    pub window_seconds: u64,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Deadline for one admission round trip. On expiry the request fails
    /// closed; the script is non-idempotent so the call is never retried.
    pub admit_deadline: Duration,
    /// Deadline for one reconciliation round trip.
    pub reconcile_deadline: Duration,
    /// Prefix for all limiter keys.
    pub key_prefix: String,
}

impl Default for RedisAdmissionConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            window_seconds: 60,
            connect_timeout: Duration::from_secs(5),
            admit_deadline: Duration::from_millis(50),
            reconcile_deadline: Duration::from_millis(250),
            key_prefix: "rl".to_string(),
        }
    }
}

impl RedisAdmissionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),
            window_seconds: std::env::var("WINDOW_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|w: u64| w.max(1))
                .unwrap_or(defaults.window_seconds),
            connect_timeout: std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            admit_deadline: std::env::var("ADMIT_DEADLINE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.admit_deadline),
            reconcile_deadline: std::env::var("RECONCILE_DEADLINE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconcile_deadline),
            key_prefix: defaults.key_prefix,
        }
    }
}

/// Redis-backed admission control shared by the whole fleet.
pub struct RedisAdmission {
    conn: ConnectionManager,
    config: RedisAdmissionConfig,
    admit_script: Script,
    reconcile_script: Script,
}

impl RedisAdmission {
    pub async fn connect(config: RedisAdmissionConfig) -> Result<Self, AdmissionError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| AdmissionError::StoreUnavailable(e.to_string()))?;

        // Bound the initial handshake so a dead store fails fast.
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| AdmissionError::StoreUnavailable("connection timed out".to_string()))?
            .map_err(|e| AdmissionError::StoreUnavailable(e.to_string()))?;

        tracing::info!(
            url = %config.url,
            window_seconds = config.window_seconds,
            "Connected to Redis admission store"
        );

        Ok(Self {
            conn,
            config,
            admit_script: Script::new(ADMIT_SCRIPT),
            reconcile_script: Script::new(RECONCILE_SCRIPT),
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, AdmissionError> {
        Self::connect(RedisAdmissionConfig::from_env()).await
    }

    fn ttl_seconds(&self) -> u64 {
        self.config.window_seconds + TTL_SLACK_SECONDS
    }

    fn dimension_keys(&self, credential: &str, dimension: Dimension) -> [String; 3] {
        let base = format!("{}:{}:{}", self.config.key_prefix, credential, dimension);
        [
            format!("{base}:idx"),
            format!("{base}:buckets"),
            format!("{base}:total"),
        ]
    }
}

#[async_trait]
impl AdmissionControl for RedisAdmission {
    async fn try_admit(
        &self,
        credential: &str,
        limits: CredentialLimits,
        request: AdmissionRequest,
    ) -> Result<AdmissionVerdict, AdmissionError> {
        let mut invocation = self.admit_script.prepare_invoke();
        for dimension in Dimension::ALL {
            for key in self.dimension_keys(credential, dimension) {
                invocation.key(key);
            }
        }
        invocation
            .arg(self.config.window_seconds)
            .arg(limits.rpm)
            .arg(limits.input_tpm)
            .arg(limits.output_tpm)
            .arg(request.input_tokens)
            .arg(request.output_token_estimate)
            .arg(self.ttl_seconds());

        let mut conn = self.conn.clone();
        let reply: Vec<i64> =
            tokio::time::timeout(self.config.admit_deadline, invocation.invoke_async(&mut conn))
                .await
                .map_err(|_| {
                    AdmissionError::StoreUnavailable(format!(
                        "admission deadline of {:?} exceeded",
                        self.config.admit_deadline
                    ))
                })?
                .map_err(classify_redis_error)?;

        parse_admit_reply(&reply)
    }

    async fn reconcile_output(
        &self,
        credential: &str,
        submit_second: u64,
        delta: i64,
    ) -> Result<(), AdmissionError> {
        let [_, buckets, total] = self.dimension_keys(credential, Dimension::Out);

        let mut invocation = self.reconcile_script.prepare_invoke();
        invocation
            .key(buckets)
            .key(total)
            .arg(submit_second)
            .arg(delta);

        let mut conn = self.conn.clone();
        let _applied: i64 = tokio::time::timeout(
            self.config.reconcile_deadline,
            invocation.invoke_async(&mut conn),
        )
        .await
        .map_err(|_| {
            AdmissionError::StoreUnavailable(format!(
                "reconciliation deadline of {:?} exceeded",
                self.config.reconcile_deadline
            ))
        })?
        .map_err(classify_redis_error)?;

        Ok(())
    }
}

/// Connection-level faults fail closed as `StoreUnavailable`; everything else
/// means the script itself misbehaved and surfaces as an internal fault,
/// never as a silent allow.
fn classify_redis_error(err: redis::RedisError) -> AdmissionError {
    if err.is_io_error()
        || err.is_timeout()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
    {
        AdmissionError::StoreUnavailable(err.to_string())
    } else {
        AdmissionError::Script(err.to_string())
    }
}

fn parse_admit_reply(reply: &[i64]) -> Result<AdmissionVerdict, AdmissionError> {
    match *reply {
        [1, submit_second, requests, input_tokens, output_tokens] => {
            Ok(AdmissionVerdict::Allowed(AdmissionGrant {
                submit_second: submit_second as u64,
                usage: WindowUsage {
                    requests: requests.max(0) as u64,
                    input_tokens: input_tokens.max(0) as u64,
                    output_tokens: output_tokens.max(0) as u64,
                },
            }))
        }
        [0, flag, retry_after_ms] => {
            let dimension = Dimension::from_flag(flag).ok_or_else(|| {
                AdmissionError::Script(format!("unknown dimension flag {flag} in deny reply"))
            })?;
            Ok(AdmissionVerdict::Denied {
                dimension,
                retry_after_ms: retry_after_ms.max(0) as u64,
            })
        }
        _ => Err(AdmissionError::Script(format!(
            "unexpected admission reply: {reply:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_allow_reply() {
        let verdict = parse_admit_reply(&[1, 1_700_000_000, 3, 120, 512]).unwrap();
        match verdict {
            AdmissionVerdict::Allowed(grant) => {
                assert_eq!(grant.submit_second, 1_700_000_000);
                assert_eq!(grant.usage.requests, 3);
                assert_eq!(grant.usage.input_tokens, 120);
                assert_eq!(grant.usage.output_tokens, 512);
            }
            AdmissionVerdict::Denied { .. } => panic!("reply encodes an allow"),
        }
    }

    #[test]
    fn parses_deny_reply() {
        let verdict = parse_admit_reply(&[0, 3, 59_800]).unwrap();
        match verdict {
            AdmissionVerdict::Denied {
                dimension,
                retry_after_ms,
            } => {
                assert_eq!(dimension, Dimension::Out);
                assert_eq!(retry_after_ms, 59_800);
            }
            AdmissionVerdict::Allowed(_) => panic!("reply encodes a deny"),
        }
    }

    #[test]
    fn rejects_malformed_replies() {
        assert!(parse_admit_reply(&[]).is_err());
        assert!(parse_admit_reply(&[2, 0, 0]).is_err());
        assert!(parse_admit_reply(&[0, 9, 100]).is_err());
        assert!(parse_admit_reply(&[1, 0]).is_err());
    }

    // The tests below need a live Redis; they connect to $REDIS_URL and are
    // skipped when it is unreachable.

    async fn connect_test_backend(window_seconds: u64) -> Option<RedisAdmission> {
        let config = RedisAdmissionConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            window_seconds,
            connect_timeout: Duration::from_secs(1),
            admit_deadline: Duration::from_millis(250),
            reconcile_deadline: Duration::from_millis(250),
            key_prefix: format!("test_rl_{}", std::process::id()),
        };
        RedisAdmission::connect(config).await.ok()
    }

    fn unlimited_but(rpm: u64) -> CredentialLimits {
        CredentialLimits {
            rpm,
            input_tpm: u64::MAX / 2,
            output_tpm: u64::MAX / 2,
        }
    }

    #[tokio::test]
    async fn admits_then_denies_on_request_limit() {
        let Some(backend) = connect_test_backend(2).await else {
            return;
        };
        let credential = "redis-admit-deny";
        let request = AdmissionRequest {
            input_tokens: 1,
            output_token_estimate: 1,
        };

        let limits = unlimited_but(2);
        assert!(backend
            .try_admit(credential, limits, request)
            .await
            .unwrap()
            .is_allowed());
        assert!(backend
            .try_admit(credential, limits, request)
            .await
            .unwrap()
            .is_allowed());

        match backend.try_admit(credential, limits, request).await.unwrap() {
            AdmissionVerdict::Denied {
                dimension,
                retry_after_ms,
            } => {
                assert_eq!(dimension, Dimension::Req);
                assert!(retry_after_ms <= 2_000);
            }
            AdmissionVerdict::Allowed(_) => panic!("third request must be denied"),
        }

        // A two-second window recovers quickly.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(backend
            .try_admit(credential, limits, request)
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn reconciliation_releases_output_budget() {
        let Some(backend) = connect_test_backend(60).await else {
            return;
        };
        let credential = "redis-reconcile";
        let limits = CredentialLimits {
            rpm: 100,
            input_tpm: u64::MAX / 2,
            output_tpm: 100,
        };

        let grant = match backend
            .try_admit(
                credential,
                limits,
                AdmissionRequest {
                    input_tokens: 1,
                    output_token_estimate: 50,
                },
            )
            .await
            .unwrap()
        {
            AdmissionVerdict::Allowed(grant) => grant,
            AdmissionVerdict::Denied { .. } => panic!("first admission must fit"),
        };

        backend
            .reconcile_output(credential, grant.submit_second, 10 - 50)
            .await
            .unwrap();

        // 10 + 60 fits only after the reconciliation gave 40 tokens back.
        match backend
            .try_admit(
                credential,
                limits,
                AdmissionRequest {
                    input_tokens: 1,
                    output_token_estimate: 60,
                },
            )
            .await
            .unwrap()
        {
            AdmissionVerdict::Allowed(grant) => assert_eq!(grant.usage.output_tokens, 70),
            AdmissionVerdict::Denied { .. } => panic!("reconciled budget must fit"),
        }
    }

    #[tokio::test]
    async fn concurrent_requests_admit_exactly_one_winner() {
        let Some(backend) = connect_test_backend(60).await else {
            return;
        };
        let backend = std::sync::Arc::new(backend);
        let limits = unlimited_but(1);

        for trial in 0..100 {
            let credential = format!("redis-race-{trial}");
            let request = AdmissionRequest {
                input_tokens: 1,
                output_token_estimate: 1,
            };

            let contenders = (0..4).map(|_| {
                let backend = backend.clone();
                let credential = credential.clone();
                async move {
                    backend
                        .try_admit(&credential, limits, request)
                        .await
                        .unwrap()
                        .is_allowed()
                }
            });
            let admitted = futures::future::join_all(contenders)
                .await
                .into_iter()
                .filter(|allowed| *allowed)
                .count();
            assert_eq!(admitted, 1, "exactly one contender may win trial {trial}");
        }
    }
}
