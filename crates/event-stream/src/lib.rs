//! Event-stream consumer for the OSMO event viewer.
//!
//! Connects to a task's event endpoint, which serves either a finished text
//! blob (terminal entities) or a growing tail (live entities), and feeds
//! parsed events to an [`EventTimeline`](pod_events::EventTimeline) in batches.
//!
//! # Usage
//!
//! ```no_run
//! use event_stream::{drive_timeline, EntityKind, EventStreamConsumer, HttpEventSource, StreamConfig};
//! use pod_events::EventTimeline;
//!
//! # async fn example() -> Result<(), event_stream::StreamError> {
//! let config = StreamConfig::from_env()?;
//! let source = HttpEventSource::new("http://osmo.local/api/workflow/wf-1/events", &config)?;
//! let consumer = EventStreamConsumer::new(source, EntityKind::Live, config);
//! let cancel = consumer.cancellation_token();
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let handle = consumer.spawn(tx);
//!
//! let mut timeline = EventTimeline::new();
//! let final_state = drive_timeline(&mut rx, &mut timeline).await;
//!
//! // Navigating away: cancel.cancel();
//! # let _ = (handle, cancel, final_state);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`EventSource`] abstracts the transport: [`HttpEventSource`] for reqwest,
//!   [`MemoryEventSource`] for scripted tests
//! - [`EventStreamConsumer`] runs the connect / read / reconnect loop and
//!   reports [`StreamState`] changes and event batches as [`StreamUpdate`]s
//! - [`drive_timeline`] and [`apply_update`] apply updates to a view's timeline

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod source;
pub mod state;

pub use config::StreamConfig;
pub use consumer::{apply_update, drive_timeline, EventStreamConsumer, StreamUpdate};
pub use error::StreamError;
pub use source::{
    ChunkStream, EventSource, HttpEventSource, MemoryChunk, MemoryConnection, MemoryEventSource,
};
pub use state::{EntityKind, StreamState};
