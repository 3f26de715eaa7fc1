//! The model client seam.
//!
//! The trait lives here rather than in atelier-interaction so that the
//! sandbox bridge and orchestrator can depend on it without a circular
//! crate dependency. The concrete HTTP implementation is provided by
//! atelier-interaction.

use crate::config::ModelOptions;
use crate::error::Result;
use crate::message::ChatMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One event on a model output stream.
///
/// After `Done` or `Error` no further events are emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental text delta, delivered in arrival order.
    Chunk(String),
    /// The stream finished successfully.
    Done,
    /// The stream failed. Terminal; no retry is performed.
    Error(String),
}

/// Handle to one in-flight model stream.
///
/// Consumers receive events in order through the channel; dropping the
/// handle or cancelling the token aborts the underlying transport.
pub struct ModelStream {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl ModelStream {
    /// Wraps a receiver and its cancellation token.
    pub fn new(events: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Receives the next event, or `None` once the producer has gone away.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Aborts the underlying transport. Events already queued may still be
    /// observed; no new ones are produced.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Token that is cancelled when the stream is aborted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for ModelStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Client for the generative backend.
///
/// Implementations open exactly one network stream per `stream` call and
/// pass options through unvalidated beyond defaulting from server config.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One-shot completion; resolves with the full response text.
    async fn complete(&self, messages: &[ChatMessage], options: &ModelOptions) -> Result<String>;

    /// Streaming completion; yields chunks then a terminal Done or Error.
    async fn stream(&self, messages: &[ChatMessage], options: &ModelOptions)
    -> Result<ModelStream>;
}
