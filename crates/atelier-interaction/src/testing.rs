//! Scripted model client for tests.
//!
//! Not compiled into release binaries in practice, but kept as a public
//! module so downstream crates can drive the pipeline deterministically in
//! their own tests.

use async_trait::async_trait;
use atelier_core::client::{ModelClient, ModelStream, StreamEvent};
use atelier_core::config::ModelOptions;
use atelier_core::error::{AtelierError, Result};
use atelier_core::message::ChatMessage;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A [`ModelClient`] that replays pre-scripted responses.
///
/// Each `stream` call consumes the next script in order; each `complete`
/// call consumes the next scripted completion. Optional per-event delay
/// lets tests exercise interleaving and staleness.
pub struct ScriptedClient {
    streams: Mutex<Vec<Vec<StreamEvent>>>,
    completions: Mutex<Vec<Result<String>>>,
    delay: Option<Duration>,
    /// Messages passed to the most recent `stream` call, for assertions.
    pub last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedClient {
    /// Client that replays the given streams in order.
    pub fn streaming(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            streams: Mutex::new(scripts),
            completions: Mutex::new(Vec::new()),
            delay: None,
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Client that replays the given one-shot completions in order.
    pub fn completing(results: Vec<Result<String>>) -> Self {
        Self {
            streams: Mutex::new(Vec::new()),
            completions: Mutex::new(results),
            delay: None,
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Adds a delay before each streamed event.
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Convenience: a single stream producing `chunks` then Done.
    pub fn single(chunks: &[&str]) -> Arc<Self> {
        let mut events: Vec<StreamEvent> = chunks
            .iter()
            .map(|c| StreamEvent::Chunk((*c).to_string()))
            .collect();
        events.push(StreamEvent::Done);
        Arc::new(Self::streaming(vec![events]))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, _messages: &[ChatMessage], _options: &ModelOptions) -> Result<String> {
        let next = {
            let mut completions = self.completions.lock().expect("completions lock");
            if completions.is_empty() {
                None
            } else {
                Some(completions.remove(0))
            }
        };
        next.unwrap_or_else(|| Err(AtelierError::internal("no scripted completion left")))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _options: &ModelOptions,
    ) -> Result<ModelStream> {
        *self.last_messages.lock().expect("messages lock") = messages.to_vec();
        let script = {
            let mut streams = self.streams.lock().expect("streams lock");
            if streams.is_empty() {
                return Err(AtelierError::internal("no scripted stream left"));
            }
            streams.remove(0)
        };

        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            for event in script {
                if let Some(delay) = delay {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if token.is_cancelled() || tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(ModelStream::new(rx, cancel))
    }
}
