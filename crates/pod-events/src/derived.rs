//! Cached per-task state computed once from an event list.
//!
//! [`compute_derived_state`] is the only function that traverses a task's
//! events. Everything downstream (grouping, filtering, display) reads the
//! cached [`TaskDerivedState`] instead of re-scanning.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::{stage_of, LifecycleStage};
use crate::phase::{phase_for_reason, PodPhase};
use crate::types::K8sEvent;

/// Reason that marks a pod as having been placed on a node.
pub const SCHEDULED_REASON: &str = "Scheduled";

/// UI-facing lifecycle category, coarser than [`LifecycleStage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Pending,
    Init,
    Running,
    Done,
    Failed,
}

impl Lifecycle {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Init,
        Self::Running,
        Self::Done,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Init => "Init",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Direct mapping from a stage. `Runtime` has none.
    const fn from_stage(stage: LifecycleStage) -> Option<Self> {
        match stage {
            LifecycleStage::Scheduling | LifecycleStage::Image => Some(Self::Pending),
            LifecycleStage::Initialization => Some(Self::Init),
            LifecycleStage::Container => Some(Self::Running),
            LifecycleStage::Completion => Some(Self::Done),
            LifecycleStage::Failure => Some(Self::Failed),
            LifecycleStage::Runtime => None,
        }
    }

    const fn from_phase(phase: PodPhase) -> Self {
        match phase {
            PodPhase::Running => Self::Running,
            PodPhase::Succeeded => Self::Done,
            PodPhase::Failed => Self::Failed,
            PodPhase::Pending | PodPhase::Unknown => Self::Pending,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed-once bundle attached to a task group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskDerivedState {
    pub pod_phase: PodPhase,
    pub lifecycle: Lifecycle,
    pub has_scheduled_event: bool,
}

/// Compute the derived state of one task.
///
/// `events` must be ascending by timestamp; the caller enforces this.
#[must_use]
pub fn compute_derived_state(events: &[K8sEvent]) -> TaskDerivedState {
    let Some(last) = events.last() else {
        return TaskDerivedState::default();
    };

    let pod_phase = events
        .iter()
        .rev()
        .find_map(|event| phase_for_reason(&event.reason))
        .unwrap_or(PodPhase::Unknown);

    let has_scheduled_event = events.iter().any(|event| event.reason == SCHEDULED_REASON);

    let lifecycle = Lifecycle::from_stage(stage_of(&last.reason)).unwrap_or_else(|| {
        events
            .iter()
            .rev()
            .find_map(|event| match stage_of(&event.reason) {
                LifecycleStage::Failure => Some(Lifecycle::Failed),
                LifecycleStage::Completion => Some(Lifecycle::Done),
                _ => None,
            })
            .unwrap_or_else(|| Lifecycle::from_phase(pod_phase))
    });

    TaskDerivedState {
        pod_phase,
        lifecycle,
        has_scheduled_event,
    }
}
