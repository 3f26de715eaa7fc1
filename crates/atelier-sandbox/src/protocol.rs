//! Messages crossing the sandbox boundary.
//!
//! Wire shape is `{ type, requestId, ...payload }` with kebab-case type
//! tags. The host treats `requestId` as an opaque correlation token and
//! never responds twice to the same id.

use atelier_core::config::ModelOptions;
use atelier_core::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// One message on the host ⇄ sandbox channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RpcMessage {
    /// Sandbox asks the host for a one-shot completion.
    CompleteRequest {
        #[serde(rename = "requestId")]
        request_id: String,
        messages: Vec<ChatMessage>,
        #[serde(default)]
        options: ModelOptions,
    },
    /// Host answers a one-shot completion.
    CompleteResponse {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Sandbox asks the host for a streaming completion.
    StreamRequest {
        #[serde(rename = "requestId")]
        request_id: String,
        messages: Vec<ChatMessage>,
        #[serde(default)]
        options: ModelOptions,
    },
    /// One streamed frame of a host answer.
    StreamResponse {
        #[serde(rename = "requestId")]
        request_id: String,
        payload: StreamPayload,
    },
}

impl RpcMessage {
    /// The correlation id this message carries.
    pub fn request_id(&self) -> &str {
        match self {
            RpcMessage::CompleteRequest { request_id, .. }
            | RpcMessage::CompleteResponse { request_id, .. }
            | RpcMessage::StreamRequest { request_id, .. }
            | RpcMessage::StreamResponse { request_id, .. } => request_id,
        }
    }

    /// Whether this message is a request (sandbox → host).
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            RpcMessage::CompleteRequest { .. } | RpcMessage::StreamRequest { .. }
        )
    }
}

/// Body of one `stream-response` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamPayload {
    /// An incremental text delta.
    Chunk { content: String },
    /// Terminal success marker.
    Done,
    /// Terminal failure marker.
    Error { message: String },
}

impl StreamPayload {
    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamPayload::Chunk { .. })
    }
}
