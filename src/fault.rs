use crate::config::MockConfig;
use axum::http::StatusCode;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// How long a request hangs before the simulated gateway timeout fires.
pub const TIMEOUT_DURATION: Duration = Duration::from_secs(120);

/// Failures picked uniformly when the error policy triggers.
pub const SIMULATED_ERRORS: [(StatusCode, &str); 3] = [
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable"),
    (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Hang for the given duration, then answer 504.
    Timeout(Duration),
    Error {
        status: StatusCode,
        message: &'static str,
    },
    /// Sleep for the given delay, then generate.
    Proceed(Duration),
}

#[derive(Debug, Clone)]
pub struct FaultPolicy {
    pub timeout_rate: u8,
    pub error_rate: u8,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub timeout: Duration,
}

impl FaultPolicy {
    pub fn from_config(config: &MockConfig) -> Self {
        Self {
            timeout_rate: config.timeout_rate,
            error_rate: config.error_rate,
            delay_min_ms: config.delay_min_ms,
            delay_max_ms: config.delay_max_ms.max(config.delay_min_ms),
            timeout: TIMEOUT_DURATION,
        }
    }

    /// Timeout is checked before error, and delay only applies when neither fires.
    pub fn decide<R: Rng>(&self, rng: &mut R) -> Outcome {
        if triggers(self.timeout_rate, rng) {
            return Outcome::Timeout(self.timeout);
        }

        if triggers(self.error_rate, rng) {
            let (status, message) = *SIMULATED_ERRORS
                .choose(rng)
                .unwrap_or(&SIMULATED_ERRORS[0]);
            return Outcome::Error { status, message };
        }

        let delay_ms = rng.gen_range(self.delay_min_ms..=self.delay_max_ms);
        Outcome::Proceed(Duration::from_millis(delay_ms))
    }
}

fn triggers<R: Rng>(rate: u8, rng: &mut R) -> bool {
    rate > 0 && rng.gen_range(1..=100u8) <= rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(timeout_rate: u8, error_rate: u8, min: u64, max: u64) -> FaultPolicy {
        FaultPolicy::from_config(&MockConfig {
            timeout_rate,
            error_rate,
            delay_min_ms: min,
            delay_max_ms: max,
            ..MockConfig::default()
        })
    }

    #[test]
    fn zero_rates_always_proceed_within_delay_range() {
        let policy = policy(0, 0, 50, 100);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            match policy.decide(&mut rng) {
                Outcome::Proceed(delay) => {
                    assert!(delay >= Duration::from_millis(50));
                    assert!(delay <= Duration::from_millis(100));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn full_timeout_rate_always_times_out() {
        let policy = policy(100, 100, 0, 0);
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..100 {
            assert_eq!(policy.decide(&mut rng), Outcome::Timeout(TIMEOUT_DURATION));
        }
    }

    #[test]
    fn full_error_rate_picks_documented_errors() {
        let policy = policy(0, 100, 0, 0);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            match policy.decide(&mut rng) {
                Outcome::Error { status, message } => {
                    assert!(SIMULATED_ERRORS.contains(&(status, message)));
                    seen.insert(status);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn partial_error_rate_mixes_outcomes() {
        let policy = policy(0, 50, 1, 1);
        let mut rng = StdRng::seed_from_u64(8);
        let errors = (0..1000)
            .filter(|_| matches!(policy.decide(&mut rng), Outcome::Error { .. }))
            .count();
        assert!((350..650).contains(&errors), "errors = {}", errors);
    }

    #[test]
    fn fixed_delay_range_is_exact() {
        let policy = policy(0, 0, 40, 40);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(
            policy.decide(&mut rng),
            Outcome::Proceed(Duration::from_millis(40))
        );
    }
}
