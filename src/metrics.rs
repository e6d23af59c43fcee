use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    avg_response_time: f64,
}

/// Request counters shared by every handler.
///
/// Timed-out requests bump `requests_total` only, so the total can run ahead of
/// `success + failed`.
#[derive(Debug)]
pub struct Metrics {
    counters: Mutex<Counters>,
    start_time: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    /// Milliseconds, averaged over successful requests only.
    pub avg_response_time: f64,
    pub start_time: DateTime<Local>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            start_time: Local::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_request(&self) {
        self.lock().requests_total += 1;
    }

    pub fn record_failure(&self) {
        self.lock().requests_failed += 1;
    }

    pub fn record_success(&self, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        let mut counters = self.lock();
        counters.requests_success += 1;
        let n = counters.requests_success as f64;
        counters.avg_response_time = (counters.avg_response_time * (n - 1.0) + elapsed_ms) / n;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.lock();
        MetricsSnapshot {
            requests_total: counters.requests_total,
            requests_success: counters.requests_success,
            requests_failed: counters.requests_failed,
            avg_response_time: counters.avg_response_time,
            start_time: self.start_time,
        }
    }
}
