//! Error types for the Atelier pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Atelier pipeline.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AtelierError {
    /// Network or stream transport failure. Terminal for the current stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Generated source could not be parsed. Non-fatal for the pipeline.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Cross-boundary RPC protocol violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An illegal conversation state transition was attempted.
    #[error("Illegal transition: {event} while {stage}")]
    State { stage: String, event: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AtelierError {
    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a State error from the current stage and the rejected event.
    pub fn state(stage: impl Into<String>, event: impl Into<String>) -> Self {
        Self::State {
            stage: stage.into(),
            event: event.into(),
        }
    }

    /// Check if this is a Transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a State error
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a Parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<std::io::Error> for AtelierError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for AtelierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AtelierError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AtelierError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A type alias for `Result<T, AtelierError>`.
pub type Result<T> = std::result::Result<T, AtelierError>;
