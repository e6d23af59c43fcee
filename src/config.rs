use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_NAME: &str = "mock-backend";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_DELAY_MIN_MS: u64 = 50;
pub const DEFAULT_DELAY_MAX_MS: u64 = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{var} must be between 0 and 100, got {value}")]
    RateOutOfRange { var: &'static str, value: u8 },
    #[error("RESPONSE_DELAY_MIN ({min}) is greater than RESPONSE_DELAY_MAX ({max})")]
    DelayRange { min: u64, max: u64 },
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    /// Identifier injected into health, revised prompts and placeholder URLs.
    pub name: String,
    pub port: u16,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Percentage (0-100) of generation requests answered with a simulated error.
    pub error_rate: u8,
    /// Percentage (0-100) of generation requests that hang and end in a 504.
    pub timeout_rate: u8,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: DEFAULT_PORT,
            delay_min_ms: DEFAULT_DELAY_MIN_MS,
            delay_max_ms: DEFAULT_DELAY_MAX_MS,
            error_rate: 0,
            timeout_rate: 0,
        }
    }
}

impl MockConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            name: lookup("MOCK_NAME").unwrap_or(defaults.name),
            port: parse_var(&lookup, "MOCK_PORT", defaults.port)?,
            delay_min_ms: parse_var(&lookup, "RESPONSE_DELAY_MIN", defaults.delay_min_ms)?,
            delay_max_ms: parse_var(&lookup, "RESPONSE_DELAY_MAX", defaults.delay_max_ms)?,
            error_rate: parse_rate(&lookup, "ERROR_RATE")?,
            timeout_rate: parse_rate(&lookup, "TIMEOUT_RATE")?,
        };

        if config.delay_min_ms > config.delay_max_ms {
            return Err(ConfigError::DelayRange {
                min: config.delay_min_ms,
                max: config.delay_max_ms,
            });
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_rate<F>(lookup: &F, var: &'static str) -> Result<u8, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u8 = parse_var(lookup, var, 0)?;
    if value > 100 {
        return Err(ConfigError::RateOutOfRange { var, value });
    }
    Ok(value)
}
