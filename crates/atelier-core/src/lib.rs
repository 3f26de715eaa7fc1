//! Shared domain model for the Atelier pipeline.
//!
//! This crate holds the types every other Atelier crate agrees on: the
//! error type, chat messages, session and analysis models, dialects,
//! conversation stages, model configuration, the [`client::ModelClient`]
//! seam and the external collaborator contracts.

pub mod analysis;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod dialect;
pub mod error;
pub mod message;
pub mod session;
pub mod stage;

// Re-export common error type
pub use error::{AtelierError, Result};
