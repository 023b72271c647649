//! Kubernetes event types observed by the event viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kubernetes event type as reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    Normal,
    Warning,
}

impl EventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }

    /// Case-insensitive parse; anything that is not "warning" is `Normal`.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        if value.eq_ignore_ascii_case("warning") {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the object an event is about (usually a pod).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A single observed Kubernetes event.
///
/// Events are immutable once parsed. Lists of events handed to derivation
/// functions are expected to be ascending by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sEvent {
    pub reason: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub involved_object: InvolvedObject,
    /// Node that reported the event
    pub source_host: Option<String>,
    pub message: String,
    /// Task name set explicitly by the backend, overrides the object name
    pub task_name: Option<String>,
    /// Retry attempt set explicitly by the backend
    pub retry_id: Option<u32>,
}

impl K8sEvent {
    /// Create an event with just the fields the derivation logic needs.
    #[must_use]
    pub fn new(
        reason: impl Into<String>,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            reason: reason.into(),
            event_type,
            timestamp,
            involved_object: InvolvedObject {
                kind: "Pod".to_string(),
                name: object_name.into(),
                namespace: None,
            },
            source_host: None,
            message: String::new(),
            task_name: None,
            retry_id: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.source_host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_task(mut self, task_name: impl Into<String>, retry_id: u32) -> Self {
        self.task_name = Some(task_name.into());
        self.retry_id = Some(retry_id);
        self
    }

    /// Key used to recognise the same event replayed after a reconnect.
    pub(crate) fn replay_key(&self) -> (DateTime<Utc>, String, String, String) {
        (
            self.timestamp,
            self.reason.clone(),
            self.involved_object.name.clone(),
            self.message.clone(),
        )
    }
}
