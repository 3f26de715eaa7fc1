//! Conversation pipeline stages.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// The stage the conversation pipeline is currently in.
///
/// Transitions between stages are validated by the orchestrator; this enum
/// only names the states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationStage {
    /// Waiting for a requirement.
    #[default]
    Idle,
    /// The requirement analyzer is streaming.
    Analyzing,
    /// An analysis is stored and generation may be requested.
    ReadyToGenerate,
    /// The generation session is streaming.
    Generating,
    /// Generation finished, source repaired and handed to the renderer.
    Completed,
    /// An analyzer or generator stream failed.
    Error,
}
