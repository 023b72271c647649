//! Consumer connection states.

use serde::Serialize;
use std::fmt;

/// What kind of entity the stream belongs to.
///
/// Decides how a clean end of body is read: a terminal entity serves a
/// finite blob, so EOF means done; a live entity's tail only ends for good
/// after the explicit completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Live,
    Terminal,
}

/// Connection state of an event-stream consumer.
///
/// `Idle → Connecting → Streaming → (Reconnecting → Connecting → Streaming)* → Closed`,
/// or `→ Error` once reconnects are exhausted or the failure is permanent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Reconnecting {
        attempt: u32,
    },
    Closed,
    /// User-visible failure; the view offers a manual retry
    Error {
        message: String,
    },
}

impl StreamState {
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Closed | Self::Error { .. })
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Streaming => f.write_str("streaming"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Closed => f.write_str("closed"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}
