//! Static reason → lifecycle stage / severity lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::EventType;

/// Coarse bucket an event reason belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Scheduling,
    Image,
    Initialization,
    Container,
    Runtime,
    Completion,
    Failure,
}

impl LifecycleStage {
    pub const ALL: [Self; 7] = [
        Self::Scheduling,
        Self::Image,
        Self::Initialization,
        Self::Container,
        Self::Runtime,
        Self::Completion,
        Self::Failure,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduling => "scheduling",
            Self::Image => "image",
            Self::Initialization => "initialization",
            Self::Container => "container",
            Self::Runtime => "runtime",
            Self::Completion => "completion",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loudly an event should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub stage: LifecycleStage,
    pub severity: Severity,
}

/// Known kubelet / scheduler reasons.
const REASON_TABLE: &[(&str, LifecycleStage, Severity)] = &[
    // Scheduling
    ("Scheduled", LifecycleStage::Scheduling, Severity::Info),
    ("FailedScheduling", LifecycleStage::Scheduling, Severity::Warn),
    ("Preempting", LifecycleStage::Scheduling, Severity::Warn),
    ("NotTriggerScaleUp", LifecycleStage::Scheduling, Severity::Warn),
    ("TriggeredScaleUp", LifecycleStage::Scheduling, Severity::Info),
    // Image
    ("Pulling", LifecycleStage::Image, Severity::Info),
    ("Pulled", LifecycleStage::Image, Severity::Info),
    ("ErrImagePull", LifecycleStage::Image, Severity::Error),
    ("ImagePullBackOff", LifecycleStage::Image, Severity::Error),
    ("ErrImageNeverPull", LifecycleStage::Image, Severity::Error),
    ("InspectFailed", LifecycleStage::Image, Severity::Error),
    // Initialization
    ("SuccessfulAttachVolume", LifecycleStage::Initialization, Severity::Info),
    ("FailedAttachVolume", LifecycleStage::Initialization, Severity::Warn),
    ("FailedMount", LifecycleStage::Initialization, Severity::Warn),
    ("FailedCreatePodSandBox", LifecycleStage::Initialization, Severity::Error),
    ("SandboxChanged", LifecycleStage::Initialization, Severity::Warn),
    // Container
    ("Created", LifecycleStage::Container, Severity::Info),
    ("Started", LifecycleStage::Container, Severity::Info),
    ("Killing", LifecycleStage::Container, Severity::Warn),
    ("BackOff", LifecycleStage::Container, Severity::Error),
    ("CreateContainerError", LifecycleStage::Container, Severity::Error),
    ("CreateContainerConfigError", LifecycleStage::Container, Severity::Error),
    // Runtime
    ("Unhealthy", LifecycleStage::Runtime, Severity::Warn),
    ("ProbeWarning", LifecycleStage::Runtime, Severity::Warn),
    ("NodeNotReady", LifecycleStage::Runtime, Severity::Warn),
    // Completion
    ("Completed", LifecycleStage::Completion, Severity::Info),
    ("Succeeded", LifecycleStage::Completion, Severity::Info),
    // Failure
    ("Failed", LifecycleStage::Failure, Severity::Error),
    ("OOMKilled", LifecycleStage::Failure, Severity::Error),
    ("OOMKilling", LifecycleStage::Failure, Severity::Error),
    ("Evicted", LifecycleStage::Failure, Severity::Error),
    ("Error", LifecycleStage::Failure, Severity::Error),
    ("DeadlineExceeded", LifecycleStage::Failure, Severity::Error),
    ("BackoffLimitExceeded", LifecycleStage::Failure, Severity::Error),
    ("Preempted", LifecycleStage::Failure, Severity::Error),
];

/// Classify an event reason.
///
/// Unknown reasons are never an error: they land in `Runtime`, with `Warn`
/// severity for `Warning` events and `Info` otherwise.
#[must_use]
pub fn classify(reason: &str, event_type: EventType) -> Classification {
    REASON_TABLE
        .iter()
        .find(|(known, _, _)| *known == reason)
        .map_or_else(
            || Classification {
                stage: LifecycleStage::Runtime,
                severity: match event_type {
                    EventType::Warning => Severity::Warn,
                    EventType::Normal => Severity::Info,
                },
            },
            |&(_, stage, severity)| Classification { stage, severity },
        )
}

/// Stage lookup only, for callers that don't need severity.
#[must_use]
pub fn stage_of(reason: &str) -> LifecycleStage {
    classify(reason, EventType::Normal).stage
}
