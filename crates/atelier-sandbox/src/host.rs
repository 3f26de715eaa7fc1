//! Execution-host abstraction over the isolated context.
//!
//! The real product evaluates generated source inside a separate browsing
//! context; this crate only needs the operations the bridge and renderer
//! rely on, so they are behind the [`ExecutionHost`] trait. The
//! [`InProcessHost`] reference implementation backs the message boundary
//! with mpsc channels and is what the tests drive.

use crate::protocol::RpcMessage;
use async_trait::async_trait;
use atelier_core::error::{AtelierError, Result};
use std::sync::Mutex;
use tokio::sync::{RwLock, mpsc};

/// Buffered boundary messages per direction.
const CHANNEL_CAPACITY: usize = 64;

/// The isolated context generated source runs in.
///
/// Exactly one router may consume the host-bound message channel;
/// [`take_outbox`](Self::take_outbox) hands it over and every later take
/// fails. Attaching to a fresh context means constructing a fresh host.
#[async_trait]
pub trait ExecutionHost: Send + Sync {
    /// Replaces the context's document and waits for it to finish loading.
    async fn load(&self, document: &str) -> Result<()>;

    /// Clears the context, discarding the current document.
    async fn clear(&self) -> Result<()>;

    /// Posts a message into the sandboxed context.
    async fn post_to_sandbox(&self, message: RpcMessage) -> Result<()>;

    /// Takes exclusive ownership of the host-bound message channel.
    async fn take_outbox(&self) -> Result<mpsc::Receiver<RpcMessage>>;

    /// The most recent runtime error reported from inside the context,
    /// cleared on every load.
    async fn runtime_error(&self) -> Option<String>;
}

/// Channel-backed host used in process.
pub struct InProcessHost {
    document: RwLock<Option<String>>,
    runtime_error: RwLock<Option<String>>,
    pending_runtime_error: RwLock<Option<String>>,
    to_host_tx: mpsc::Sender<RpcMessage>,
    to_host_rx: Mutex<Option<mpsc::Receiver<RpcMessage>>>,
    to_sandbox_tx: mpsc::Sender<RpcMessage>,
    to_sandbox_rx: Mutex<Option<mpsc::Receiver<RpcMessage>>>,
    load_count: RwLock<u64>,
}

impl InProcessHost {
    pub fn new() -> Self {
        let (to_host_tx, to_host_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (to_sandbox_tx, to_sandbox_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            document: RwLock::new(None),
            runtime_error: RwLock::new(None),
            pending_runtime_error: RwLock::new(None),
            to_host_tx,
            to_host_rx: Mutex::new(Some(to_host_rx)),
            to_sandbox_tx,
            to_sandbox_rx: Mutex::new(Some(to_sandbox_rx)),
            load_count: RwLock::new(0),
        }
    }

    /// The sandbox side of the boundary: a sender for requests leaving the
    /// context and the receiver of responses entering it. The receiver can
    /// be taken once; it is what a [`SandboxModelProxy`] dispatches from.
    ///
    /// [`SandboxModelProxy`]: crate::proxy::SandboxModelProxy
    pub fn sandbox_endpoint(&self) -> Result<(mpsc::Sender<RpcMessage>, mpsc::Receiver<RpcMessage>)> {
        let receiver = self
            .to_sandbox_rx
            .lock()
            .map_err(|_| AtelierError::internal("sandbox inbox lock poisoned"))?
            .take()
            .ok_or_else(|| AtelierError::protocol("sandbox endpoint already taken"))?;
        Ok((self.to_host_tx.clone(), receiver))
    }

    /// Records a runtime error as the sandboxed error boundary would.
    pub async fn report_runtime_error(&self, message: impl Into<String>) {
        *self.runtime_error.write().await = Some(message.into());
    }

    /// Makes the next load report a runtime error, as if the loaded
    /// document threw during evaluation.
    pub async fn script_runtime_error(&self, message: impl Into<String>) {
        *self.pending_runtime_error.write().await = Some(message.into());
    }

    /// The currently loaded document, if any.
    pub async fn document(&self) -> Option<String> {
        self.document.read().await.clone()
    }

    /// How many documents have been loaded into this context.
    pub async fn load_count(&self) -> u64 {
        *self.load_count.read().await
    }
}

impl Default for InProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionHost for InProcessHost {
    async fn load(&self, document: &str) -> Result<()> {
        *self.runtime_error.write().await = self.pending_runtime_error.write().await.take();
        *self.document.write().await = Some(document.to_string());
        *self.load_count.write().await += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.document.write().await = None;
        *self.runtime_error.write().await = None;
        Ok(())
    }

    async fn post_to_sandbox(&self, message: RpcMessage) -> Result<()> {
        self.to_sandbox_tx
            .send(message)
            .await
            .map_err(|_| AtelierError::protocol("sandbox side of the boundary is gone"))
    }

    async fn take_outbox(&self) -> Result<mpsc::Receiver<RpcMessage>> {
        self.to_host_rx
            .lock()
            .map_err(|_| AtelierError::internal("host outbox lock poisoned"))?
            .take()
            .ok_or_else(|| AtelierError::protocol("host outbox already taken"))
    }

    async fn runtime_error(&self) -> Option<String> {
        self.runtime_error.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_replaces_document_and_clears_error() {
        let host = InProcessHost::new();
        host.report_runtime_error("boom").await;
        host.load("<html></html>").await.unwrap();
        assert_eq!(host.document().await.as_deref(), Some("<html></html>"));
        assert!(host.runtime_error().await.is_none());
        assert_eq!(host.load_count().await, 1);
    }

    #[tokio::test]
    async fn test_outbox_taken_once() {
        let host = InProcessHost::new();
        assert!(host.take_outbox().await.is_ok());
        let second = host.take_outbox().await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_boundary_carries_messages() {
        let host = InProcessHost::new();
        let mut outbox = host.take_outbox().await.unwrap();
        let (to_host, mut inbox) = host.sandbox_endpoint().unwrap();

        let request = RpcMessage::CompleteRequest {
            request_id: "r1".into(),
            messages: vec![],
            options: Default::default(),
        };
        to_host.send(request.clone()).await.unwrap();
        assert_eq!(outbox.recv().await, Some(request));

        let response = RpcMessage::CompleteResponse {
            request_id: "r1".into(),
            success: true,
            content: Some("ok".into()),
            error: None,
        };
        host.post_to_sandbox(response.clone()).await.unwrap();
        assert_eq!(inbox.recv().await, Some(response));
    }
}
