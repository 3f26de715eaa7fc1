//! Conversation orchestration over the generate → repair → render pipeline.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Orchestrator, OrchestratorEvent};
pub use state::ConversationState;
