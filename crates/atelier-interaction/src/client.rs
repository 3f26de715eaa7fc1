//! HttpModelClient - streaming client for the LLM gateway.
//!
//! Talks to the gateway's `/api/llm` surface: one-shot chat, streaming chat
//! over `data: <json>` frames, server-side default config and health.

use crate::sse::{SseDecoder, SseFrame};
use async_trait::async_trait;
use atelier_core::client::{ModelClient, ModelStream, StreamEvent};
use atelier_core::config::{ModelConfig, ModelOptions};
use atelier_core::error::{AtelierError, Result};
use atelier_core::message::ChatMessage;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const CHAT_PATH: &str = "/api/llm/chat";
const STREAM_PATH: &str = "/api/llm/chat/stream";
const CONFIG_PATH: &str = "/api/llm/config";
const HEALTH_PATH: &str = "/api/llm/health";

/// Buffered events per in-flight stream before backpressure applies.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Client for the LLM gateway HTTP API.
#[derive(Clone)]
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    defaults: Arc<RwLock<ModelConfig>>,
}

impl HttpModelClient {
    /// Creates a client against the given gateway base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            defaults: Arc::new(RwLock::new(ModelConfig::default())),
        }
    }

    /// Overrides the default model configuration after construction.
    pub fn with_config(self, config: ModelConfig) -> Self {
        Self {
            defaults: Arc::new(RwLock::new(config)),
            ..self
        }
    }

    /// Fetches server-side default configuration and stores it as the
    /// merge base for subsequent calls.
    pub async fn fetch_config(&self) -> Result<ModelConfig> {
        let url = format!("{}{CONFIG_PATH}", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AtelierError::config(format!(
                "config endpoint returned {}",
                response.status()
            )));
        }
        let wrapper: ConfigEnvelope = response.json().await?;
        *self.defaults.write().await = wrapper.data.clone();
        Ok(wrapper.data)
    }

    /// Whether the gateway reports the model service healthy.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}{HEALTH_PATH}", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body: HealthEnvelope = response.json().await?;
        Ok(body.status == "healthy")
    }

    /// Current merge-base configuration.
    pub async fn defaults(&self) -> ModelConfig {
        self.defaults.read().await.clone()
    }

    async fn merged(&self, options: &ModelOptions) -> ModelOptions {
        self.defaults.read().await.merge_under(options)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, messages: &[ChatMessage], options: &ModelOptions) -> Result<String> {
        let url = format!("{}{CHAT_PATH}", self.base_url);
        let body = ChatRequest {
            messages,
            options: self.merged(options).await,
        };
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AtelierError::transport(format!(
                "chat endpoint returned {}",
                response.status()
            )));
        }
        let parsed: ChatResponse = response.json().await?;
        if parsed.success {
            Ok(parsed.data.unwrap_or_default())
        } else {
            Err(AtelierError::transport(
                parsed.error.unwrap_or_else(|| "unknown gateway error".to_string()),
            ))
        }
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ModelOptions,
    ) -> Result<ModelStream> {
        let url = format!("{}{STREAM_PATH}", self.base_url);
        let body = ChatRequest {
            messages,
            options: self.merged(options).await,
        };
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AtelierError::transport(format!(
                "stream endpoint returned {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut bytes = response.bytes_stream();
            loop {
                let chunk = tokio::select! {
                    _ = token.cancelled() => {
                        debug!("model stream aborted by caller");
                        return;
                    }
                    chunk = bytes.next() => chunk,
                };
                match chunk {
                    Some(Ok(chunk)) => {
                        for frame in decoder.feed(&chunk) {
                            let (event, terminal) = match frame {
                                SseFrame::Content(delta) => (StreamEvent::Chunk(delta), false),
                                SseFrame::Done => (StreamEvent::Done, true),
                                SseFrame::Error(reason) => (StreamEvent::Error(reason), true),
                            };
                            if tx.send(event).await.is_err() {
                                return;
                            }
                            if terminal {
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%err, "model stream transport failure");
                        let _ = tx.send(StreamEvent::Error(err.to_string())).await;
                        return;
                    }
                    None => {
                        // Connection closed without an explicit marker; the
                        // wire format treats that as end of stream.
                        let _ = tx.send(StreamEvent::Done).await;
                        return;
                    }
                }
            }
        });

        Ok(ModelStream::new(rx, cancel))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    options: ModelOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    success: bool,
    data: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ConfigEnvelope {
    data: ModelConfig,
}

#[derive(Deserialize)]
struct HealthEnvelope {
    status: String,
}
