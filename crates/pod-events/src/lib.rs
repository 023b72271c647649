//! Kubernetes event derivation and filtering for the OSMO event viewer.
//!
//! This crate turns a flat list of pod events into per-task groups with
//! cached derived state, and filters those groups with search chips.
//!
//! # Usage
//!
//! ```no_run
//! use pod_events::{filter_task_groups, group_events_by_task, ChipSet, StreamParser};
//!
//! let mut parser = StreamParser::new();
//! let events = parser.feed(b"{\"reason\":\"Scheduled\",\"timestamp\":\"2024-05-01T10:00:00Z\",\"involved_object\":{\"name\":\"train\"}}\n");
//!
//! let groups = group_events_by_task(&events);
//! let chips = ChipSet::from_query("f=task%3Atrain").unwrap();
//! let visible = filter_task_groups(&groups, chips.as_slice());
//! assert_eq!(visible.len(), 1);
//! ```
//!
//! # Pipeline
//!
//! - [`classify`] maps a reason to a [`LifecycleStage`] and [`Severity`]
//! - [`derive_phase`] finds the current [`PodPhase`]
//! - [`compute_derived_state`] is the single traversal producing [`TaskDerivedState`]
//! - [`group_events_by_task`] builds [`TaskGroup`]s
//! - [`filter_task_groups`] applies [`SearchChip`]s
//! - [`EventTimeline`] owns a view's events and regroups on each batch

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod context;
pub mod derived;
pub mod error;
pub mod filter;
pub mod group;
pub mod parse;
pub mod phase;
pub mod timeline;
pub mod types;

pub use classify::{classify, Classification, LifecycleStage, Severity};
pub use context::{resolve_display, DisplayContext, DisplayLifecycle, LifecycleInference};
pub use derived::{compute_derived_state, Lifecycle, TaskDerivedState};
pub use error::{FilterError, ParseError};
pub use filter::{filter_task_groups, ChipField, ChipSet, ChipVariant, SearchChip};
pub use group::{group_events_by_task, group_events_by_task_at, TaskGroup, TaskKey};
pub use parse::{parse_line, LineBuffer, StreamLine, StreamParser, END_MARKER};
pub use phase::{derive_phase, PodPhase};
pub use timeline::EventTimeline;
pub use types::{EventType, InvolvedObject, K8sEvent};
