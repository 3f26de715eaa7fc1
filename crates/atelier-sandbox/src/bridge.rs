//! Host-side bridge: routes sandbox RPC requests to the model client.
//!
//! One router per execution context. Attaching takes exclusive ownership of
//! the context's outbox, so a stale router can never double-deliver; after
//! detach, in-flight sandboxed calls simply get no response.

use crate::host::ExecutionHost;
use crate::protocol::{RpcMessage, StreamPayload};
use atelier_core::client::{ModelClient, StreamEvent};
use atelier_core::config::{ModelConfig, ModelOptions};
use atelier_core::error::Result;
use atelier_core::message::ChatMessage;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Proxies model calls issued from inside the sandbox back out to the
/// [`ModelClient`], with server defaults merged under caller options.
pub struct SandboxBridge {
    client: Arc<dyn ModelClient>,
    defaults: ModelConfig,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl SandboxBridge {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            defaults: ModelConfig::default(),
            router: Mutex::new(None),
        }
    }

    /// Sets the server-side default configuration used as the merge base.
    pub fn with_defaults(mut self, defaults: ModelConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Attaches the bridge to an execution context.
    ///
    /// Takes the context's outbox and spawns the router over it. Any router
    /// from a previous attachment is aborted first.
    ///
    /// # Errors
    ///
    /// Fails if the context's outbox was already taken.
    pub async fn attach(&self, host: Arc<dyn ExecutionHost>) -> Result<()> {
        let outbox = host.take_outbox().await?;
        let handle = tokio::spawn(route(
            outbox,
            host,
            self.client.clone(),
            self.defaults.clone(),
        ));
        if let Ok(mut guard) = self.router.lock()
            && let Some(previous) = guard.replace(handle)
        {
            previous.abort();
        }
        info!("sandbox bridge attached");
        Ok(())
    }

    /// Detaches the router. In-flight sandboxed calls receive no response.
    pub fn detach(&self) {
        if let Ok(mut guard) = self.router.lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
            debug!("sandbox bridge detached");
        }
    }
}

impl Drop for SandboxBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn route(
    mut outbox: mpsc::Receiver<RpcMessage>,
    host: Arc<dyn ExecutionHost>,
    client: Arc<dyn ModelClient>,
    defaults: ModelConfig,
) {
    // Ids already answered (or being answered). A duplicate request with a
    // completed id must never receive a second response.
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(message) = outbox.recv().await {
        let id = message.request_id().to_string();
        if !message.is_request() {
            debug!(%id, "dropping non-request message from sandbox");
            continue;
        }
        if !seen.insert(id.clone()) {
            debug!(%id, "dropping duplicate request id");
            continue;
        }
        match message {
            RpcMessage::CompleteRequest {
                request_id,
                messages,
                options,
            } => {
                let merged = defaults.merge_under(&options);
                tokio::spawn(handle_complete(
                    host.clone(),
                    client.clone(),
                    request_id,
                    messages,
                    merged,
                ));
            }
            RpcMessage::StreamRequest {
                request_id,
                messages,
                options,
            } => {
                let merged = defaults.merge_under(&options);
                tokio::spawn(handle_stream(
                    host.clone(),
                    client.clone(),
                    request_id,
                    messages,
                    merged,
                ));
            }
            RpcMessage::CompleteResponse { .. } | RpcMessage::StreamResponse { .. } => {}
        }
    }
}

async fn handle_complete(
    host: Arc<dyn ExecutionHost>,
    client: Arc<dyn ModelClient>,
    request_id: String,
    messages: Vec<ChatMessage>,
    options: ModelOptions,
) {
    let response = match client.complete(&messages, &options).await {
        Ok(content) => RpcMessage::CompleteResponse {
            request_id,
            success: true,
            content: Some(content),
            error: None,
        },
        Err(err) => RpcMessage::CompleteResponse {
            request_id,
            success: false,
            content: None,
            error: Some(err.to_string()),
        },
    };
    // Post failure means the context is gone; nothing to notify.
    let _ = host.post_to_sandbox(response).await;
}

async fn handle_stream(
    host: Arc<dyn ExecutionHost>,
    client: Arc<dyn ModelClient>,
    request_id: String,
    messages: Vec<ChatMessage>,
    options: ModelOptions,
) {
    let mut stream = match client.stream(&messages, &options).await {
        Ok(stream) => stream,
        Err(err) => {
            let _ = host
                .post_to_sandbox(RpcMessage::StreamResponse {
                    request_id,
                    payload: StreamPayload::Error {
                        message: err.to_string(),
                    },
                })
                .await;
            return;
        }
    };

    loop {
        let payload = match stream.next_event().await {
            Some(StreamEvent::Chunk(content)) => StreamPayload::Chunk { content },
            Some(StreamEvent::Done) => StreamPayload::Done,
            Some(StreamEvent::Error(message)) => StreamPayload::Error { message },
            None => StreamPayload::Error {
                message: "model stream ended unexpectedly".to_string(),
            },
        };
        let terminal = payload.is_terminal();
        let posted = host
            .post_to_sandbox(RpcMessage::StreamResponse {
                request_id: request_id.clone(),
                payload,
            })
            .await;
        if terminal || posted.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InProcessHost;
    use crate::proxy::SandboxModelProxy;
    use async_trait::async_trait;
    use atelier_core::client::ModelStream;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Replies with the last user message, so tests can tell responses apart.
    struct EchoClient;

    #[async_trait]
    impl ModelClient for EchoClient {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _options: &ModelOptions,
        ) -> Result<String> {
            Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }

        async fn stream(
            &self,
            messages: &[ChatMessage],
            _options: &ModelOptions,
        ) -> Result<ModelStream> {
            let content = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                for piece in content.split_inclusive(' ') {
                    if tx.send(StreamEvent::Chunk(piece.to_string())).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(StreamEvent::Done).await;
            });
            Ok(ModelStream::new(rx, CancellationToken::new()))
        }
    }

    async fn wired() -> (Arc<InProcessHost>, SandboxBridge, SandboxModelProxy) {
        let host = Arc::new(InProcessHost::new());
        let bridge = SandboxBridge::new(Arc::new(EchoClient));
        bridge.attach(host.clone()).await.unwrap();
        let (to_host, inbox) = host.sandbox_endpoint().unwrap();
        let proxy = SandboxModelProxy::new(to_host, inbox);
        (host, bridge, proxy)
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_their_own_responses() {
        let (_host, _bridge, proxy) = wired().await;
        let proxy = Arc::new(proxy);

        let mut handles = Vec::new();
        for i in 0..8 {
            let proxy = proxy.clone();
            handles.push(tokio::spawn(async move {
                let prompt = format!("prompt-{i}");
                let reply = proxy
                    .complete(vec![ChatMessage::user(&prompt)], ModelOptions::default())
                    .await
                    .unwrap();
                (prompt, reply)
            }));
        }
        for handle in handles {
            let (prompt, reply) = handle.await.unwrap();
            assert_eq!(reply, prompt);
        }
    }

    #[tokio::test]
    async fn test_streaming_call_round_trips() {
        let (_host, _bridge, proxy) = wired().await;
        let mut rx = proxy
            .stream(
                vec![ChatMessage::user("one two three")],
                ModelOptions::default(),
            )
            .await
            .unwrap();

        let mut accumulated = String::new();
        loop {
            match rx.recv().await {
                Some(StreamEvent::Chunk(chunk)) => accumulated.push_str(&chunk),
                Some(StreamEvent::Done) => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(accumulated, "one two three");
    }

    #[tokio::test]
    async fn test_duplicate_request_id_answered_once() {
        let host = Arc::new(InProcessHost::new());
        let bridge = SandboxBridge::new(Arc::new(EchoClient));
        bridge.attach(host.clone()).await.unwrap();
        let (to_host, mut inbox) = host.sandbox_endpoint().unwrap();

        let request = RpcMessage::CompleteRequest {
            request_id: "dup".into(),
            messages: vec![ChatMessage::user("hello")],
            options: ModelOptions::default(),
        };
        to_host.send(request.clone()).await.unwrap();
        to_host.send(request).await.unwrap();

        let first = inbox.recv().await.unwrap();
        assert_eq!(first.request_id(), "dup");
        let second = tokio::time::timeout(Duration::from_millis(100), inbox.recv()).await;
        assert!(second.is_err(), "duplicate id must not be answered twice");
    }

    #[tokio::test]
    async fn test_detached_bridge_gives_no_response() {
        let (_host, bridge, proxy) = wired().await;
        bridge.detach();
        // Give the aborted router time to drop the outbox.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = proxy
            .complete(vec![ChatMessage::user("anyone there")], ModelOptions::default())
            .await;
        assert!(result.is_err());
    }
}
