//! Two-level chip filtering over task groups.
//!
//! Chips on different fields AND together, chips on the same field OR
//! together. Task-level fields keep or drop a whole group; event-level fields
//! narrow the events a group displays, and a group with no surviving events
//! is dropped. A `search` chip is satisfied by the task name, otherwise it
//! narrows events like an event-level field.

mod chip;

pub use chip::{ChipField, ChipScope, ChipSet, ChipVariant, SearchChip, CHIP_QUERY_KEY};

use std::collections::BTreeMap;

use crate::classify::classify;
use crate::group::TaskGroup;
use crate::types::K8sEvent;

/// Filter groups by chips.
///
/// Pure: the same input always gives the same output, and chip order is
/// irrelevant. With no chips the groups come back unchanged. Surviving groups
/// keep the derived state of their full event list.
#[must_use]
pub fn filter_task_groups(groups: &[TaskGroup], chips: &[SearchChip]) -> Vec<TaskGroup> {
    if chips.is_empty() {
        return groups.to_vec();
    }

    let mut by_field: BTreeMap<ChipField, Vec<&SearchChip>> = BTreeMap::new();
    for chip in chips {
        by_field.entry(chip.field).or_default().push(chip);
    }

    groups
        .iter()
        .filter_map(|group| filter_group(group, &by_field))
        .collect()
}

fn filter_group(
    group: &TaskGroup,
    by_field: &BTreeMap<ChipField, Vec<&SearchChip>>,
) -> Option<TaskGroup> {
    let mut event_predicates: Vec<&[&SearchChip]> = Vec::new();

    for (field, chips) in by_field {
        let task_match = chips.iter().any(|chip| matches_task(group, chip));
        match field.scope() {
            ChipScope::Task if !task_match => return None,
            ChipScope::Task => {}
            ChipScope::Both if task_match => {}
            ChipScope::Both | ChipScope::Event => event_predicates.push(chips),
        }
    }

    if event_predicates.is_empty() {
        return Some(group.clone());
    }

    let events: Vec<K8sEvent> = group
        .events
        .iter()
        .filter(|event| {
            event_predicates
                .iter()
                .all(|chips| chips.iter().any(|chip| matches_event(event, chip)))
        })
        .cloned()
        .collect();

    if events.is_empty() {
        return None;
    }

    Some(TaskGroup {
        events,
        ..group.clone()
    })
}

fn matches_task(group: &TaskGroup, chip: &SearchChip) -> bool {
    let value = chip.value.as_str();
    match chip.field {
        ChipField::Task | ChipField::Search => contains_ignore_case(group.name(), value),
        ChipField::Retry => value.parse::<u32>().is_ok_and(|r| r == group.retry_id()),
        ChipField::Lifecycle => group.derived.lifecycle.as_str().eq_ignore_ascii_case(value),
        ChipField::Phase => group.derived.pod_phase.as_str().eq_ignore_ascii_case(value),
        _ => false,
    }
}

fn matches_event(event: &K8sEvent, chip: &SearchChip) -> bool {
    let value = chip.value.as_str();
    match chip.field {
        ChipField::Reason => event.reason.eq_ignore_ascii_case(value),
        ChipField::Type => event.event_type.as_str().eq_ignore_ascii_case(value),
        ChipField::Stage => classify(&event.reason, event.event_type)
            .stage
            .as_str()
            .eq_ignore_ascii_case(value),
        ChipField::Severity => classify(&event.reason, event.event_type)
            .severity
            .as_str()
            .eq_ignore_ascii_case(value),
        ChipField::Host => event
            .source_host
            .as_deref()
            .is_some_and(|host| contains_ignore_case(host, value)),
        ChipField::Message => contains_ignore_case(&event.message, value),
        ChipField::Search => {
            contains_ignore_case(&event.reason, value) || contains_ignore_case(&event.message, value)
        }
        _ => false,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
