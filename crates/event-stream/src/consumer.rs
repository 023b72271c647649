//! Reconnecting, batching stream consumer.
//!
//! The consumer reads one connection at a time, parses lines as they arrive
//! and hands parsed events downstream in batches so a burst of lines causes
//! one regroup instead of one per line. A live stream that ends without the
//! completion marker, or breaks mid-read, is treated as a network blip and
//! reconnected with bounded exponential backoff.

use futures::StreamExt;
use pod_events::{EventTimeline, K8sEvent, StreamParser};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::source::{ChunkStream, EventSource};
use crate::state::{EntityKind, StreamState};

/// Message from a running consumer to its view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    State(StreamState),
    Batch(Vec<K8sEvent>),
}

/// How a single connection ended.
enum ConnectionEnd {
    /// Entity finished; no reconnect
    Finished,
    /// Connection dropped; `delivered` says whether it produced any data
    Dropped { error: StreamError, delivered: bool },
    /// Cancelled or the receiver went away
    Stopped,
}

pub struct EventStreamConsumer<S> {
    source: S,
    kind: EntityKind,
    config: StreamConfig,
    cancel: CancellationToken,
}

impl<S: EventSource> EventStreamConsumer<S> {
    pub fn new(source: S, kind: EntityKind, config: StreamConfig) -> Self {
        Self {
            source,
            kind,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the in-flight read when cancelled, e.g. when the
    /// owning view goes away.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run the consumer to completion, sending updates to `tx`.
    ///
    /// Returns the final state: `Closed` on completion or cancellation,
    /// `Error` when the failure was permanent or reconnects ran out.
    pub async fn run(&self, tx: mpsc::Sender<StreamUpdate>) -> StreamState {
        let mut attempt: u32 = 0;

        loop {
            if !emit(&tx, &self.cancel, StreamState::Connecting).await {
                return StreamState::Closed;
            }
            info!(source = %self.source.describe(), attempt, "Connecting to event stream");

            let opened = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return close(&tx, &self.cancel).await,
                opened = self.source.open() => opened,
            };

            let connected_at = Instant::now();
            let end = match opened {
                Ok(body) => {
                    if !emit(&tx, &self.cancel, StreamState::Streaming).await {
                        return StreamState::Closed;
                    }
                    self.read_connection(body, &tx).await
                }
                Err(error) => ConnectionEnd::Dropped {
                    error,
                    delivered: false,
                },
            };

            match end {
                ConnectionEnd::Finished => {
                    info!(source = %self.source.describe(), "Event stream completed");
                    return close(&tx, &self.cancel).await;
                }
                ConnectionEnd::Stopped => return close(&tx, &self.cancel).await,
                ConnectionEnd::Dropped { error, delivered } => {
                    if !error.is_retryable() {
                        warn!(error = %error, "Event stream failed permanently");
                        return fail(&tx, &self.cancel, &error).await;
                    }
                    // A connection that streamed data for a while resets the budget
                    if delivered && connected_at.elapsed() >= self.config.stable_connection() {
                        attempt = 0;
                    }
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        let exhausted = StreamError::RetriesExhausted {
                            attempts: self.config.max_retries,
                        };
                        warn!(error = %error, "Giving up on event stream");
                        return fail(&tx, &self.cancel, &exhausted).await;
                    }

                    let delay = self.config.backoff(attempt);
                    warn!(
                        error = %error,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Event stream dropped, reconnecting"
                    );
                    if !emit(&tx, &self.cancel, StreamState::Reconnecting { attempt }).await {
                        return StreamState::Closed;
                    }
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return close(&tx, &self.cancel).await,
                        () = sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the tokio runtime.
    pub fn spawn(self, tx: mpsc::Sender<StreamUpdate>) -> JoinHandle<StreamState>
    where
        S: 'static,
    {
        tokio::spawn(async move { self.run(tx).await })
    }

    async fn read_connection(
        &self,
        mut body: ChunkStream,
        tx: &mpsc::Sender<StreamUpdate>,
    ) -> ConnectionEnd {
        let mut parser = StreamParser::new();
        let mut batch = Batcher::new(&self.config, &self.cancel);
        let mut delivered = false;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Event stream read cancelled");
                    return ConnectionEnd::Stopped;
                }
                () = sleep_until(batch.deadline.unwrap_or_else(Instant::now)), if batch.deadline.is_some() => {
                    if !batch.flush(tx).await {
                        return ConnectionEnd::Stopped;
                    }
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        delivered = true;
                        let events = parser.feed(&bytes);
                        if parser.saw_end() {
                            // The server may hold the connection open after the marker
                            batch.push(events);
                            return if batch.flush(tx).await {
                                ConnectionEnd::Finished
                            } else {
                                ConnectionEnd::Stopped
                            };
                        }
                        if batch.push(events) && !batch.flush(tx).await {
                            return ConnectionEnd::Stopped;
                        }
                    }
                    Some(Err(error)) => {
                        if !batch.flush(tx).await {
                            return ConnectionEnd::Stopped;
                        }
                        return ConnectionEnd::Dropped { error, delivered };
                    }
                    None => {
                        batch.push(parser.finish());
                        if !batch.flush(tx).await {
                            return ConnectionEnd::Stopped;
                        }
                        if parser.skipped() > 0 {
                            debug!(skipped = parser.skipped(), "Malformed event lines skipped");
                        }
                        if parser.saw_end() || self.kind == EntityKind::Terminal {
                            return ConnectionEnd::Finished;
                        }
                        return ConnectionEnd::Dropped {
                            error: StreamError::Read(
                                "live stream ended without completion marker".to_string(),
                            ),
                            delivered,
                        };
                    }
                },
            }
        }
    }
}

/// Holds parsed events until the size or time threshold is hit.
struct Batcher<'a> {
    pending: Vec<K8sEvent>,
    deadline: Option<Instant>,
    max_events: usize,
    interval: std::time::Duration,
    cancel: &'a CancellationToken,
}

impl<'a> Batcher<'a> {
    fn new(config: &StreamConfig, cancel: &'a CancellationToken) -> Self {
        Self {
            pending: Vec::new(),
            deadline: None,
            max_events: config.flush_max_events.max(1),
            interval: config.flush_interval(),
            cancel,
        }
    }

    /// Buffer events; returns true when the size threshold says flush now.
    fn push(&mut self, events: Vec<K8sEvent>) -> bool {
        if events.is_empty() {
            return false;
        }
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
        self.pending.extend(events);
        self.pending.len() >= self.max_events
    }

    /// Send buffered events; returns false when the receiver is gone or the
    /// consumer was cancelled while the channel was full.
    async fn flush(&mut self, tx: &mpsc::Sender<StreamUpdate>) -> bool {
        self.deadline = None;
        if self.pending.is_empty() {
            return true;
        }
        let events = std::mem::take(&mut self.pending);
        debug!(count = events.len(), "Flushing event batch");
        send(tx, self.cancel, StreamUpdate::Batch(events)).await
    }
}

async fn close(tx: &mpsc::Sender<StreamUpdate>, cancel: &CancellationToken) -> StreamState {
    emit(tx, cancel, StreamState::Closed).await;
    StreamState::Closed
}

async fn fail(
    tx: &mpsc::Sender<StreamUpdate>,
    cancel: &CancellationToken,
    error: &StreamError,
) -> StreamState {
    let state = StreamState::Error {
        message: error.to_string(),
    };
    emit(tx, cancel, state.clone()).await;
    state
}

async fn emit(
    tx: &mpsc::Sender<StreamUpdate>,
    cancel: &CancellationToken,
    state: StreamState,
) -> bool {
    send(tx, cancel, StreamUpdate::State(state)).await
}

/// Send unless cancelled first. A send with free capacity wins even after
/// cancellation, so the final `Closed` still reaches a draining view.
async fn send(
    tx: &mpsc::Sender<StreamUpdate>,
    cancel: &CancellationToken,
    update: StreamUpdate,
) -> bool {
    tokio::select! {
        biased;
        sent = tx.send(update) => sent.is_ok(),
        () = cancel.cancelled() => false,
    }
}

/// Apply updates to a view's timeline until the consumer finishes.
///
/// Returns the last state reported.
pub async fn drive_timeline(
    rx: &mut mpsc::Receiver<StreamUpdate>,
    timeline: &mut EventTimeline,
) -> StreamState {
    let mut state = StreamState::Idle;
    while let Some(update) = rx.recv().await {
        if let Some(next) = apply_update(timeline, update) {
            state = next;
        }
    }
    state
}

/// Apply one update to a timeline, returning the new state if it was a
/// state change.
///
/// Each `Streaming` state starts a connection that may replay events the
/// timeline already holds.
pub fn apply_update(timeline: &mut EventTimeline, update: StreamUpdate) -> Option<StreamState> {
    match update {
        StreamUpdate::Batch(events) => {
            timeline.extend(events);
            None
        }
        StreamUpdate::State(state) => {
            if state == StreamState::Streaming {
                timeline.expect_replay();
            }
            Some(state)
        }
    }
}
