//! Where stream bytes come from.
//!
//! [`HttpEventSource`] reads a chunked HTTP body with reqwest.
//! [`MemoryEventSource`] replays scripted connections for tests and demos.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::StreamError;

/// Body of one open connection.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, StreamError>>;

/// A reconnectable byte stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a fresh connection. Each call starts the stream from the beginning.
    async fn open(&self) -> Result<ChunkStream, StreamError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Event stream served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    url: String,
    client: reqwest::Client,
}

impl HttpEventSource {
    /// Build a source for `url`.
    ///
    /// Only the connect phase has a timeout; a live tail may stay open
    /// indefinitely.
    pub fn new(url: impl Into<String>, config: &StreamConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(url, client))
    }

    #[must_use]
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self) -> Result<ChunkStream, StreamError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
            });
        }
        debug!(url = %self.url, status = status.as_u16(), "Event stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(StreamError::from))
            .boxed())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// One scripted step of a [`MemoryConnection`].
#[derive(Debug, Clone)]
pub enum MemoryChunk {
    Data(Vec<u8>),
    Delay(Duration),
    /// Body read fails with this message
    Fail(String),
    /// Never yields again
    Hang,
}

impl MemoryChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Data(text.into().into_bytes())
    }
}

/// Scripted outcome of one `open()` call.
#[derive(Debug, Clone)]
pub enum MemoryConnection {
    /// Connection answered with this HTTP status
    Refused(u16),
    Body(Vec<MemoryChunk>),
}

/// In-memory source that hands out scripted connections in order.
///
/// Once the script is used up every further `open()` fails with a
/// retryable read error.
#[derive(Debug, Default)]
pub struct MemoryEventSource {
    connections: Mutex<VecDeque<MemoryConnection>>,
    opened: AtomicUsize,
}

impl MemoryEventSource {
    pub fn new(connections: impl IntoIterator<Item = MemoryConnection>) -> Self {
        Self {
            connections: Mutex::new(connections.into_iter().collect()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Single connection serving `body` in one chunk.
    pub fn from_body(body: impl Into<String>) -> Self {
        Self::new([MemoryConnection::Body(vec![MemoryChunk::text(body)])])
    }

    /// How many times `open()` was called.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn open(&self) -> Result<ChunkStream, StreamError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            None => Err(StreamError::Read("no scripted connection left".to_string())),
            Some(MemoryConnection::Refused(status)) => Err(StreamError::Status { status }),
            Some(MemoryConnection::Body(chunks)) => Ok(stream::iter(chunks)
                .filter_map(|chunk| async move {
                    match chunk {
                        MemoryChunk::Data(bytes) => Some(Ok(bytes)),
                        MemoryChunk::Delay(delay) => {
                            tokio::time::sleep(delay).await;
                            None
                        }
                        MemoryChunk::Fail(message) => Some(Err(StreamError::Read(message))),
                        MemoryChunk::Hang => {
                            futures::future::pending::<()>().await;
                            None
                        }
                    }
                })
                .boxed()),
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
