//! Event log owned by a single view.
//!
//! Holds the accumulated events for one workflow or task view and regroups
//! them wholesale on every batch. Derived state is never patched in place.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::filter::{filter_task_groups, ChipSet};
use crate::group::{group_events_by_task_at, TaskGroup};
use crate::types::K8sEvent;

type ReplayKey = (DateTime<Utc>, String, String, String);

#[derive(Debug, Default)]
pub struct EventTimeline {
    events: Vec<K8sEvent>,
    /// Occurrences held per replay key
    held: HashMap<ReplayKey, usize>,
    /// Occurrences still expected from the replaying connection
    replay: HashMap<ReplayKey, usize>,
    groups: Vec<TaskGroup>,
}

impl EventTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a new connection.
    ///
    /// A live tail replays from the start after a reconnect. Until the
    /// replay is used up, each event already held is matched once and
    /// dropped. Events with identical keys within one connection, such as
    /// repeated `BackOff` in the same second, are all kept.
    pub fn expect_replay(&mut self) {
        self.replay.clone_from(&self.held);
    }

    /// Append a batch and regroup. Returns how many events were new.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = K8sEvent>) -> usize {
        self.extend_at(batch, Utc::now())
    }

    /// Same as [`extend`](Self::extend) with a fixed clock for open durations.
    pub fn extend_at(&mut self, batch: impl IntoIterator<Item = K8sEvent>, now: DateTime<Utc>) -> usize {
        let before = self.events.len();
        for event in batch {
            let key = event.replay_key();
            if let Some(remaining) = self.replay.get_mut(&key).filter(|n| **n > 0) {
                *remaining -= 1;
                continue;
            }
            *self.held.entry(key).or_default() += 1;
            self.events.push(event);
        }
        let added = self.events.len() - before;
        if added == 0 {
            return 0;
        }

        // Arrival order is usually ascending already; stable sort keeps ties
        // in arrival order.
        self.events.sort_by_key(|event| event.timestamp);
        self.groups = group_events_by_task_at(&self.events, now);
        debug!(
            added,
            total = self.events.len(),
            groups = self.groups.len(),
            "Regrouped event timeline"
        );
        added
    }

    /// Drop everything, e.g. when the stream is restarted from scratch.
    pub fn reset(&mut self) {
        self.events.clear();
        self.held.clear();
        self.replay.clear();
        self.groups.clear();
    }

    #[must_use]
    pub fn events(&self) -> &[K8sEvent] {
        &self.events
    }

    #[must_use]
    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    #[must_use]
    pub fn filtered(&self, chips: &ChipSet) -> Vec<TaskGroup> {
        filter_task_groups(&self.groups, chips.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
