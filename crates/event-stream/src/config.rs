//! Consumer configuration.
//!
//! Defaults can be overridden through environment variables:
//!
//! - `OSMO_STREAM_MAX_RETRIES`: reconnect attempts before giving up (default 3)
//! - `OSMO_STREAM_INITIAL_BACKOFF_MS`: first reconnect delay (default 500)
//! - `OSMO_STREAM_MAX_BACKOFF_MS`: reconnect delay ceiling (default 5000)
//! - `OSMO_STREAM_FLUSH_INTERVAL_MS`: longest time parsed events are held (default 100)
//! - `OSMO_STREAM_FLUSH_MAX_EVENTS`: batch size that forces a flush (default 200)
//! - `OSMO_STREAM_CONNECT_TIMEOUT_SECS`: HTTP connect timeout (default 10)
//! - `OSMO_STREAM_STABLE_SECS`: uptime after which a dropped connection no
//!   longer counts against the retry budget (default 30)

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StreamError;

const ENV_MAX_RETRIES: &str = "OSMO_STREAM_MAX_RETRIES";
const ENV_INITIAL_BACKOFF_MS: &str = "OSMO_STREAM_INITIAL_BACKOFF_MS";
const ENV_MAX_BACKOFF_MS: &str = "OSMO_STREAM_MAX_BACKOFF_MS";
const ENV_FLUSH_INTERVAL_MS: &str = "OSMO_STREAM_FLUSH_INTERVAL_MS";
const ENV_FLUSH_MAX_EVENTS: &str = "OSMO_STREAM_FLUSH_MAX_EVENTS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "OSMO_STREAM_CONNECT_TIMEOUT_SECS";
const ENV_STABLE_SECS: &str = "OSMO_STREAM_STABLE_SECS";

/// Tuning for an [`EventStreamConsumer`](crate::EventStreamConsumer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Reconnect attempts after a dropped live stream
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Parsed events are flushed at least this often
    pub flush_interval_ms: u64,
    /// ...or as soon as this many are buffered
    pub flush_max_events: usize,
    pub connect_timeout_secs: u64,
    pub stable_connection_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            flush_interval_ms: 100,
            flush_max_events: 200,
            connect_timeout_secs: 10,
            stable_connection_secs: 30,
        }
    }
}

impl StreamConfig {
    /// Defaults overlaid with any `OSMO_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self, StreamError> {
        let defaults = Self::default();
        let config = Self {
            max_retries: env_or(ENV_MAX_RETRIES, defaults.max_retries)?,
            initial_backoff_ms: env_or(ENV_INITIAL_BACKOFF_MS, defaults.initial_backoff_ms)?,
            max_backoff_ms: env_or(ENV_MAX_BACKOFF_MS, defaults.max_backoff_ms)?,
            flush_interval_ms: env_or(ENV_FLUSH_INTERVAL_MS, defaults.flush_interval_ms)?,
            flush_max_events: env_or(ENV_FLUSH_MAX_EVENTS, defaults.flush_max_events)?,
            connect_timeout_secs: env_or(ENV_CONNECT_TIMEOUT_SECS, defaults.connect_timeout_secs)?,
            stable_connection_secs: env_or(ENV_STABLE_SECS, defaults.stable_connection_secs)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.flush_max_events == 0 {
            return Err(StreamError::Config(
                "flush_max_events must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(StreamError::Config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Delay before reconnect `attempt` (1-based): doubles each time, capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1_u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn stable_connection(&self) -> Duration {
        Duration::from_secs(self.stable_connection_secs)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, StreamError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| StreamError::Config(format!("{key} has invalid value {raw:?}"))),
        _ => Ok(default),
    }
}
