//! Pod phase derivation from an event history.
//!
//! The phase comes from the most recent *classifiable* event rather than the
//! literal last event. Noise reasons interleaved with meaningful ones are
//! skipped, and a later success after a failure reports success.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::K8sEvent;

/// Execution-unit status, mirroring the Kubernetes pod phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Unknown,
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl PodPhase {
    pub const ALL: [Self; 5] = [
        Self::Unknown,
        Self::Pending,
        Self::Running,
        Self::Succeeded,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUCCEEDED_REASONS: &[&str] = &["Completed", "Succeeded"];

const FAILED_REASONS: &[&str] = &[
    "Failed",
    "OOMKilled",
    "OOMKilling",
    "Evicted",
    "Error",
    "DeadlineExceeded",
    "BackoffLimitExceeded",
    "Preempted",
];

const RUNNING_REASONS: &[&str] = &["Started"];

const PENDING_REASONS: &[&str] = &[
    "Scheduled",
    "FailedScheduling",
    "Pulling",
    "Pulled",
    "ErrImagePull",
    "ImagePullBackOff",
    "Created",
    "FailedMount",
    "FailedCreatePodSandBox",
    "SuccessfulAttachVolume",
];

/// Map a single reason to the phase it implies, if any.
///
/// The four reason sets are disjoint, so the check order doesn't matter.
#[must_use]
pub fn phase_for_reason(reason: &str) -> Option<PodPhase> {
    if SUCCEEDED_REASONS.contains(&reason) {
        Some(PodPhase::Succeeded)
    } else if FAILED_REASONS.contains(&reason) {
        Some(PodPhase::Failed)
    } else if RUNNING_REASONS.contains(&reason) {
        Some(PodPhase::Running)
    } else if PENDING_REASONS.contains(&reason) {
        Some(PodPhase::Pending)
    } else {
        None
    }
}

/// Derive the current pod phase from an event list in any order.
///
/// Events are stably sorted newest first, so for equal timestamps the later
/// list position still wins.
#[must_use]
pub fn derive_phase(events: &[K8sEvent]) -> PodPhase {
    let mut newest_first: Vec<(usize, &K8sEvent)> = events.iter().enumerate().collect();
    newest_first.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));

    newest_first
        .into_iter()
        .find_map(|(_, event)| phase_for_reason(&event.reason))
        .unwrap_or(PodPhase::Unknown)
}
