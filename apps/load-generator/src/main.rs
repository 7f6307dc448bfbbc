//! Load generator for the Tollgate fleet.
//!
//! Spawns N concurrent workers that rotate through nodes and credentials for
//! a fixed duration, then prints a JSON summary: totals, per-node splits and
//! mean success latency. Payloads are pre-generated so the hot loop spends
//! its time on the wire, not on JSON encoding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::Rng;
use serde::Serialize;

const PROMPTS: &[&str] = &[
    "Explain the significance of distributed rate limiting in microservices.",
    "List three ways to optimize token usage when calling LLM APIs.",
    "Draft an email announcing a new AI assistant feature for our app.",
    "Summarize the latest sprint planning decisions in bullet points.",
    "Generate three creative marketing slogans for a coffee brand.",
];

/// Load generator for the Tollgate gateway fleet.
#[derive(Parser, Debug)]
#[command(name = "tollgate-loadgen")]
#[command(about = "Drives a fleet of gateway nodes and reports throughput", long_about = None)]
struct Args {
    /// Base URL of a gateway node; repeat for a fleet.
    #[arg(long = "node", required = true)]
    nodes: Vec<String>,

    /// API key to rotate through; repeat for several.
    #[arg(long = "api-key", required = true)]
    api_keys: Vec<String>,

    /// Test duration in seconds.
    #[arg(long, default_value_t = 20)]
    duration: u64,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = 50)]
    concurrency: usize,

    /// Pre-generated payload variants.
    #[arg(long, default_value_t = 512)]
    payload_cache_size: usize,

    /// HTTP connection pool size per node.
    #[arg(long, default_value_t = 2000)]
    max_connections: usize,
}

#[derive(Debug, Default)]
struct Stats {
    success: u64,
    throttled: u64,
    failed: u64,
    total_latency: Duration,
    per_node_success: HashMap<String, u64>,
    per_node_throttled: HashMap<String, u64>,
}

impl Stats {
    fn record(&mut self, node: &str, status: Option<u16>, latency: Duration) {
        match status {
            Some(200) => {
                self.success += 1;
                self.total_latency += latency;
                *self.per_node_success.entry(node.to_string()).or_default() += 1;
            }
            Some(429) => {
                self.throttled += 1;
                *self.per_node_throttled.entry(node.to_string()).or_default() += 1;
            }
            _ => self.failed += 1,
        }
    }

    fn merge(&mut self, other: Stats) {
        self.success += other.success;
        self.throttled += other.throttled;
        self.failed += other.failed;
        self.total_latency += other.total_latency;
        for (node, count) in other.per_node_success {
            *self.per_node_success.entry(node).or_default() += count;
        }
        for (node, count) in other.per_node_throttled {
            *self.per_node_throttled.entry(node).or_default() += count;
        }
    }
}

#[derive(Serialize)]
struct Summary {
    total_requests: u64,
    success: u64,
    throttled: u64,
    failed: u64,
    success_avg_latency_ms: f64,
    per_node_success: HashMap<String, u64>,
    per_node_throttled: HashMap<String, u64>,
}

fn build_payload_cache(size: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..size.max(1))
        .map(|_| {
            let prompt = PROMPTS[rng.gen_range(0..PROMPTS.len())];
            let max_tokens: u32 = rng.gen_range(32..=256);
            serde_json::to_vec(&serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are a concise assistant."},
                    {"role": "user", "content": prompt},
                ],
                "max_tokens": max_tokens,
            }))
            .expect("payload serializes")
        })
        .collect()
}

async fn worker(
    client: reqwest::Client,
    nodes: Arc<Vec<String>>,
    api_keys: Arc<Vec<String>>,
    payloads: Arc<Vec<Vec<u8>>>,
    deadline: Instant,
) -> Stats {
    let mut stats = Stats::default();

    while Instant::now() < deadline {
        let (node, api_key, payload) = {
            let mut rng = rand::thread_rng();
            (
                &nodes[rng.gen_range(0..nodes.len())],
                &api_keys[rng.gen_range(0..api_keys.len())],
                payloads[rng.gen_range(0..payloads.len())].clone(),
            )
        };

        let url = format!("{}/v1/chat/completions", node.trim_end_matches('/'));
        let started = Instant::now();
        let status = client
            .post(&url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .ok()
            .map(|response| response.status().as_u16());
        stats.record(node, status, started.elapsed());
    }

    stats
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(args.max_connections)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("HTTP client builds");

    let nodes = Arc::new(args.nodes);
    let api_keys = Arc::new(args.api_keys);
    let payloads = Arc::new(build_payload_cache(args.payload_cache_size));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    let workers: Vec<_> = (0..args.concurrency.max(1))
        .map(|_| {
            tokio::spawn(worker(
                client.clone(),
                nodes.clone(),
                api_keys.clone(),
                payloads.clone(),
                deadline,
            ))
        })
        .collect();

    let mut stats = Stats::default();
    for handle in workers {
        if let Ok(worker_stats) = handle.await {
            stats.merge(worker_stats);
        }
    }

    let avg_latency_ms = if stats.success > 0 {
        stats.total_latency.as_secs_f64() * 1000.0 / stats.success as f64
    } else {
        0.0
    };

    let summary = Summary {
        total_requests: stats.success + stats.throttled + stats.failed,
        success: stats.success,
        throttled: stats.throttled,
        failed: stats.failed,
        success_avg_latency_ms: (avg_latency_ms * 100.0).round() / 100.0,
        per_node_success: stats.per_node_success,
        per_node_throttled: stats.per_node_throttled,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("summary serializes")
    );
}
