//! Line grammar of the task event stream.
//!
//! Every line is one JSON event record. The literal line [`END_MARKER`] means
//! the server finished the stream on purpose. Malformed lines are skipped and
//! counted; they never abort the stream.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::ParseError;
use crate::types::{EventType, InvolvedObject, K8sEvent};

/// Explicit end-of-stream marker line.
pub const END_MARKER: &str = "[DONE]";

/// One meaningful line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Event(K8sEvent),
    End,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    reason: Option<String>,
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(alias = "lastTimestamp", alias = "last_timestamp")]
    timestamp: Option<String>,
    #[serde(alias = "involvedObject")]
    involved_object: Option<RawObject>,
    #[serde(alias = "host", alias = "sourceHost")]
    source_host: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "task_name", alias = "taskName")]
    task: Option<String>,
    #[serde(alias = "retryId")]
    retry_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(default)]
    kind: Option<String>,
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<StreamLine>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == END_MARKER {
        return Ok(Some(StreamLine::End));
    }

    let raw: RawEvent = serde_json::from_str(line)?;

    let reason = raw
        .reason
        .filter(|r| !r.is_empty())
        .ok_or(ParseError::MissingField("reason"))?;
    let timestamp_raw = raw.timestamp.ok_or(ParseError::MissingField("timestamp"))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_raw)
        .map_err(|source| ParseError::Timestamp {
            value: timestamp_raw.clone(),
            source,
        })?
        .with_timezone(&Utc);
    let object = raw
        .involved_object
        .ok_or(ParseError::MissingField("involved_object"))?;
    let object_name = object
        .name
        .filter(|n| !n.is_empty())
        .ok_or(ParseError::MissingField("involved_object.name"))?;

    Ok(Some(StreamLine::Event(K8sEvent {
        reason,
        event_type: raw
            .event_type
            .as_deref()
            .map_or(EventType::Normal, EventType::from_str_lossy),
        timestamp,
        involved_object: InvolvedObject {
            kind: object.kind.unwrap_or_else(|| "Pod".to_string()),
            name: object_name,
            namespace: object.namespace,
        },
        source_host: raw.source_host.filter(|h| !h.is_empty()),
        message: raw.message.unwrap_or_default(),
        task_name: raw.task.filter(|t| !t.is_empty()),
        retry_id: raw.retry_id,
    })))
}

/// Reassembles lines that arrive split across chunk boundaries.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(decode_line(&line))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(&['\n', '\r'][..])
        .to_string()
}

/// Incremental parser for one connection's worth of stream data.
#[derive(Debug, Default)]
pub struct StreamParser {
    lines: LineBuffer,
    skipped: usize,
    ended: bool,
}

impl StreamParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<K8sEvent> {
        let lines = self.lines.push(chunk);
        lines
            .iter()
            .filter_map(|line| self.accept(line))
            .collect()
    }

    /// Parse whatever is left after the body ends.
    pub fn finish(&mut self) -> Vec<K8sEvent> {
        self.lines
            .finish()
            .and_then(|line| self.accept(&line))
            .into_iter()
            .collect()
    }

    /// Whether the explicit end marker was seen.
    #[must_use]
    pub fn saw_end(&self) -> bool {
        self.ended
    }

    /// Malformed lines skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn accept(&mut self, line: &str) -> Option<K8sEvent> {
        match parse_line(line) {
            Ok(Some(StreamLine::Event(event))) => Some(event),
            Ok(Some(StreamLine::End)) => {
                self.ended = true;
                None
            }
            Ok(None) => None,
            Err(e) => {
                self.skipped += 1;
                debug!(error = %e, "Skipping malformed event line");
                None
            }
        }
    }
}
