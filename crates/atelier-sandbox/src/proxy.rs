//! Sandbox-side model proxy.
//!
//! Injected into the sandboxed global scope as `llm` / `llmStream` in the
//! real product. Each call allocates a fresh correlation id and waits only
//! for messages carrying that id, so concurrent in-sandbox calls never see
//! each other's responses.

use crate::protocol::{RpcMessage, StreamPayload};
use atelier_core::client::StreamEvent;
use atelier_core::config::ModelOptions;
use atelier_core::error::{AtelierError, Result};
use atelier_core::message::ChatMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const WAITER_CAPACITY: usize = 32;

type WaiterMap = Arc<Mutex<HashMap<String, mpsc::Sender<RpcMessage>>>>;

/// Model access for code running inside the sandbox.
pub struct SandboxModelProxy {
    to_host: mpsc::Sender<RpcMessage>,
    waiters: WaiterMap,
    dispatcher: JoinHandle<()>,
}

impl SandboxModelProxy {
    /// Wires a proxy over the sandbox side of the boundary.
    ///
    /// Spawns one dispatcher over the inbox; messages whose id matches no
    /// registered waiter are dropped silently.
    pub fn new(to_host: mpsc::Sender<RpcMessage>, mut inbox: mpsc::Receiver<RpcMessage>) -> Self {
        let waiters: WaiterMap = Arc::new(Mutex::new(HashMap::new()));
        let map = waiters.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let waiter = match map.lock() {
                    Ok(guard) => guard.get(message.request_id()).cloned(),
                    Err(_) => return,
                };
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(message).await;
                    }
                    None => {
                        debug!(id = message.request_id(), "dropping unmatched response");
                    }
                }
            }
        });
        Self {
            to_host,
            waiters,
            dispatcher,
        }
    }

    /// One-shot completion across the boundary.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: ModelOptions,
    ) -> Result<String> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut rx = self.register(&request_id)?;
        let sent = self
            .to_host
            .send(RpcMessage::CompleteRequest {
                request_id: request_id.clone(),
                messages,
                options,
            })
            .await;
        if sent.is_err() {
            self.unregister(&request_id);
            return Err(AtelierError::protocol("host side of the boundary is gone"));
        }

        let response = rx.recv().await;
        self.unregister(&request_id);
        match response {
            Some(RpcMessage::CompleteResponse {
                success, content, error, ..
            }) => {
                if success {
                    Ok(content.unwrap_or_default())
                } else {
                    Err(AtelierError::transport(
                        error.unwrap_or_else(|| "completion failed".to_string()),
                    ))
                }
            }
            Some(other) => Err(AtelierError::protocol(format!(
                "unexpected reply to complete-request: {other:?}"
            ))),
            None => Err(AtelierError::protocol("no response before teardown")),
        }
    }

    /// Streaming completion across the boundary. Yields chunks in arrival
    /// order followed by exactly one terminal event.
    pub async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        options: ModelOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut raw = self.register(&request_id)?;
        let sent = self
            .to_host
            .send(RpcMessage::StreamRequest {
                request_id: request_id.clone(),
                messages,
                options,
            })
            .await;
        if sent.is_err() {
            self.unregister(&request_id);
            return Err(AtelierError::protocol("host side of the boundary is gone"));
        }

        let (tx, rx) = mpsc::channel(WAITER_CAPACITY);
        let waiters = self.waiters.clone();
        tokio::spawn(async move {
            while let Some(message) = raw.recv().await {
                let RpcMessage::StreamResponse { payload, .. } = message else {
                    continue;
                };
                let (event, terminal) = match payload {
                    StreamPayload::Chunk { content } => (StreamEvent::Chunk(content), false),
                    StreamPayload::Done => (StreamEvent::Done, true),
                    StreamPayload::Error { message } => (StreamEvent::Error(message), true),
                };
                if tx.send(event).await.is_err() || terminal {
                    break;
                }
            }
            if let Ok(mut guard) = waiters.lock() {
                guard.remove(&request_id);
            }
        });
        Ok(rx)
    }

    fn register(&self, request_id: &str) -> Result<mpsc::Receiver<RpcMessage>> {
        let (tx, rx) = mpsc::channel(WAITER_CAPACITY);
        self.waiters
            .lock()
            .map_err(|_| AtelierError::internal("waiter map lock poisoned"))?
            .insert(request_id.to_string(), tx);
        Ok(rx)
    }

    fn unregister(&self, request_id: &str) {
        if let Ok(mut guard) = self.waiters.lock() {
            guard.remove(request_id);
        }
    }
}

impl Drop for SandboxModelProxy {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
