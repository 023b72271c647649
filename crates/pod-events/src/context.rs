//! Display-time interpretation of derived state.
//!
//! The event stream alone cannot tell whether a task that was last seen
//! running actually finished. When the parent workflow is already terminal
//! the viewer infers completion, and that inference is reported as such
//! instead of being folded into the observed lifecycle.

use serde::{Deserialize, Serialize};

use crate::derived::{Lifecycle, TaskDerivedState};
use crate::phase::PodPhase;

/// Read-only facts about the entity that owns the events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayContext {
    /// Parent workflow or task has reached a terminal status
    pub parent_terminal: bool,
}

/// Where a displayed lifecycle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleInference {
    /// Taken directly from the events
    Observed,
    /// Last known phase was Running and the parent is terminal; success is
    /// assumed, not reported by the backend
    InferredDone,
    /// Parent is terminal but the task never got past Pending/Init
    TerminatedWithoutCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLifecycle {
    pub lifecycle: Lifecycle,
    pub inference: LifecycleInference,
}

impl DisplayLifecycle {
    #[must_use]
    pub const fn is_inferred(&self) -> bool {
        !matches!(self.inference, LifecycleInference::Observed)
    }
}

/// Resolve what lifecycle to display for a task.
#[must_use]
pub fn resolve_display(derived: &TaskDerivedState, ctx: &DisplayContext) -> DisplayLifecycle {
    let observed = DisplayLifecycle {
        lifecycle: derived.lifecycle,
        inference: LifecycleInference::Observed,
    };

    if !ctx.parent_terminal || derived.lifecycle.is_terminal() {
        return observed;
    }

    if derived.pod_phase == PodPhase::Running {
        return DisplayLifecycle {
            lifecycle: Lifecycle::Done,
            inference: LifecycleInference::InferredDone,
        };
    }

    match derived.lifecycle {
        Lifecycle::Pending | Lifecycle::Init => DisplayLifecycle {
            lifecycle: derived.lifecycle,
            inference: LifecycleInference::TerminatedWithoutCompletion,
        },
        _ => observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pod_phase: PodPhase, lifecycle: Lifecycle) -> TaskDerivedState {
        TaskDerivedState {
            pod_phase,
            lifecycle,
            has_scheduled_event: true,
        }
    }

    #[test]
    fn test_live_parent_is_observed() {
        let d = resolve_display(
            &state(PodPhase::Running, Lifecycle::Running),
            &DisplayContext::default(),
        );
        assert_eq!(d.lifecycle, Lifecycle::Running);
        assert!(!d.is_inferred());
    }

    #[test]
    fn test_running_under_terminal_parent_is_inferred_done() {
        let ctx = DisplayContext {
            parent_terminal: true,
        };
        let d = resolve_display(&state(PodPhase::Running, Lifecycle::Running), &ctx);
        assert_eq!(d.lifecycle, Lifecycle::Done);
        assert_eq!(d.inference, LifecycleInference::InferredDone);
    }

    #[test]
    fn test_pending_under_terminal_parent() {
        let ctx = DisplayContext {
            parent_terminal: true,
        };
        let d = resolve_display(&state(PodPhase::Pending, Lifecycle::Init), &ctx);
        assert_eq!(d.lifecycle, Lifecycle::Init);
        assert_eq!(d.inference, LifecycleInference::TerminatedWithoutCompletion);
    }

    #[test]
    fn test_terminal_lifecycle_is_never_overridden() {
        let ctx = DisplayContext {
            parent_terminal: true,
        };
        let d = resolve_display(&state(PodPhase::Failed, Lifecycle::Failed), &ctx);
        assert_eq!(d.lifecycle, Lifecycle::Failed);
        assert!(!d.is_inferred());
    }
}
