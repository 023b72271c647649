//! Error types for the event-stream consumer.

use thiserror::Error;

/// Errors raised while connecting to or reading an event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP request failed (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server returned status {status}")]
    Status { status: u16 },

    /// Body stream broke mid-read
    #[error("stream read failed: {0}")]
    Read(String),

    /// Reconnect budget spent
    #[error("stream dropped and {attempts} reconnect attempts failed")]
    RetriesExhausted { attempts: u32 },

    /// Invalid configuration
    #[error("invalid stream configuration: {0}")]
    Config(String),
}

impl StreamError {
    /// Whether a reconnect could plausibly succeed.
    ///
    /// Client errors (4xx) mean the entity or URL is wrong and are not retried;
    /// 408 and 429 are the exceptions.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Read(_) => true,
            Self::Status { status } => !(400..500).contains(status) || matches!(status, 408 | 429),
            Self::RetriesExhausted { .. } | Self::Config(_) => false,
        }
    }
}
