//! Load generator for a running mock backend.
//!
//! Usage: `simulator [base_url] [requests] [timeout_secs]`
//!
//! Fires all requests concurrently, then reports outcomes, client-side latency
//! percentiles and the server's own `/metrics`.

use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::task;

enum CallOutcome {
    Success,
    Status(u16),
    TimedOut,
    Failed(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "http://localhost:8001".to_string());
    let total: usize = args.get(2).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(100);
    let timeout_secs: u64 = args.get(3).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(5);

    println!(
        "Starting load test against {} ({} concurrent requests, {}s client timeout)...",
        base_url, total, timeout_secs
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    let endpoint = format!("{}/v1/images/generations", base_url);
    let start_time = Instant::now();

    let mut tasks = Vec::with_capacity(total);
    for i in 0..total {
        let client = client.clone();
        let endpoint = endpoint.clone();

        tasks.push(task::spawn(async move {
            // Half the calls pin a seed so their payloads are reproducible.
            let seed = if i % 2 == 0 { Some(i as i64) } else { None };
            let body = serde_json::json!({
                "prompt": format!("load test {}", i),
                "n": 1,
                "width": 8,
                "height": 8,
                "seed": seed,
            });

            let call_start = Instant::now();
            let outcome = match client.post(&endpoint).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => CallOutcome::Success,
                Ok(resp) => CallOutcome::Status(resp.status().as_u16()),
                Err(e) if e.is_timeout() => CallOutcome::TimedOut,
                Err(e) => CallOutcome::Failed(e.to_string()),
            };
            (outcome, call_start.elapsed())
        }));
    }

    let mut latencies = Histogram::<u64>::new(3)?;
    let mut successes = 0usize;
    let mut timeouts = 0usize;
    let mut by_status: BTreeMap<u16, usize> = BTreeMap::new();
    let mut transport_errors = Vec::new();

    for t in tasks {
        let (outcome, elapsed) = t.await?;
        match outcome {
            CallOutcome::Success => {
                successes += 1;
                latencies.record(elapsed.as_millis() as u64)?;
            }
            CallOutcome::Status(code) => *by_status.entry(code).or_default() += 1,
            CallOutcome::TimedOut => timeouts += 1,
            CallOutcome::Failed(e) => transport_errors.push(e),
        }
    }

    let duration = start_time.elapsed();

    println!("--- Results ---");
    println!("Total Requests: {}", total);
    println!("Success: {}", successes);
    for (code, count) in &by_status {
        println!("HTTP {}: {}", code, count);
    }
    println!("Client timeouts: {}", timeouts);
    println!("Transport errors: {}", transport_errors.len());
    if let Some(first) = transport_errors.first() {
        println!("  first: {}", first);
    }
    println!("Total Time: {:?}", duration);
    println!("RPS: {:.2}", total as f64 / duration.as_secs_f64());

    if latencies.len() > 0 {
        println!(
            "Latency ms (success) p50: {} p90: {} p99: {} max: {}",
            latencies.value_at_quantile(0.50),
            latencies.value_at_quantile(0.90),
            latencies.value_at_quantile(0.99),
            latencies.max()
        );
    }

    match client.get(format!("{}/metrics", base_url)).send().await {
        Ok(resp) => {
            let metrics: serde_json::Value = resp.json().await?;
            println!("--- Server metrics ---");
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Err(e) => println!("Could not fetch server metrics: {}", e),
    }

    Ok(())
}
