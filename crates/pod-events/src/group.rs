//! Grouping of a flat event list into per-(task, retry) groups.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::derived::{compute_derived_state, TaskDerivedState};
use crate::types::K8sEvent;

/// Pod names of retried tasks end in `-retry-<n>`.
static RETRY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<task>.+)-retry-(?P<retry>\d+)$").unwrap());

/// Identity of a task group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub name: String,
    pub retry_id: u32,
}

impl TaskKey {
    /// Resolve the task identity of an event.
    ///
    /// Explicit `task_name` / `retry_id` fields win; otherwise both come from
    /// the involved object name.
    #[must_use]
    pub fn of(event: &K8sEvent) -> Self {
        let object_name = event.involved_object.name.as_str();
        let (parsed_name, parsed_retry) = match RETRY_SUFFIX.captures(object_name) {
            Some(caps) => (
                caps.name("task").map_or(object_name, |m| m.as_str()),
                caps.name("retry").and_then(|m| m.as_str().parse().ok()),
            ),
            None => (object_name, None),
        };

        Self {
            name: event
                .task_name
                .clone()
                .unwrap_or_else(|| parsed_name.to_string()),
            retry_id: event.retry_id.or(parsed_retry).unwrap_or(0),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.retry_id)
    }
}

/// All events belonging to one (task name, retry id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub key: TaskKey,
    /// Ascending by timestamp
    pub events: Vec<K8sEvent>,
    pub derived: TaskDerivedState,
    /// Human-readable duration, e.g. `3m 12s`
    pub duration: String,
    /// UI-only expansion state
    pub expanded: bool,
}

impl TaskGroup {
    fn build(key: TaskKey, mut events: Vec<K8sEvent>, now: DateTime<Utc>) -> Self {
        events.sort_by_key(|event| event.timestamp);
        let derived = compute_derived_state(&events);
        let duration = group_duration(&events, &derived, now);
        Self {
            key,
            events,
            derived,
            duration,
            expanded: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }

    #[must_use]
    pub fn retry_id(&self) -> u32 {
        self.key.retry_id
    }

    #[must_use]
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }
}

/// Group events by task using the current wall clock for open durations.
#[must_use]
pub fn group_events_by_task(events: &[K8sEvent]) -> Vec<TaskGroup> {
    group_events_by_task_at(events, Utc::now())
}

/// Group events by task, measuring unterminated groups up to `now`.
///
/// Groups come out in order of first appearance in `events`, so a longer
/// list with the same prefix yields the same leading groups.
#[must_use]
pub fn group_events_by_task_at(events: &[K8sEvent], now: DateTime<Utc>) -> Vec<TaskGroup> {
    let mut index: HashMap<TaskKey, usize> = HashMap::new();
    let mut buckets: Vec<(TaskKey, Vec<K8sEvent>)> = Vec::new();

    for event in events {
        let key = TaskKey::of(event);
        if let Some(&slot) = index.get(&key) {
            buckets[slot].1.push(event.clone());
        } else {
            index.insert(key.clone(), buckets.len());
            buckets.push((key, vec![event.clone()]));
        }
    }

    buckets
        .into_iter()
        .map(|(key, events)| TaskGroup::build(key, events, now))
        .collect()
}

fn group_duration(events: &[K8sEvent], derived: &TaskDerivedState, now: DateTime<Utc>) -> String {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return format_duration(0);
    };
    let end = if derived.lifecycle.is_terminal() {
        last.timestamp
    } else {
        now.max(last.timestamp)
    };
    format_duration((end - first.timestamp).num_seconds())
}

/// Format a number of seconds the way the event viewer shows durations.
#[must_use]
pub fn format_duration(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
