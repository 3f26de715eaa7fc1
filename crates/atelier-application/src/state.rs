//! Conversation state and its legal transitions.
//!
//! [`ConversationState`] is the orchestrator's single source of truth;
//! [`transition`](ConversationState::transition) is the only mutation path
//! for the stage field, and rejects anything outside the table below:
//!
//! ```text
//! idle/error/completed  -> analyzing          (requirement submitted)
//! analyzing             -> ready_to_generate  (analysis completed)
//! ready_to_generate     -> generating         (generation requested)
//! completed             -> generating         (continuation requested)
//! generating            -> completed          (generation finished)
//! any non-idle          -> error
//! any                   -> idle               (reset; dialect kept)
//! ```

use atelier_core::analysis::Analysis;
use atelier_core::collaborators::TemplateInfo;
use atelier_core::dialect::Dialect;
use atelier_core::error::{AtelierError, Result};
use atelier_core::session::Session;
use atelier_core::stage::ConversationStage;

/// The orchestrator's single source of truth for one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Current pipeline stage.
    pub stage: ConversationStage,
    /// The requirement currently being worked on.
    pub requirement: Option<String>,
    /// The live analysis, if one has been produced or is streaming.
    pub analysis: Option<Analysis>,
    /// The live generation session, if one exists.
    pub session: Option<Session>,
    /// The template selected to seed generation, if any.
    pub template: Option<TemplateInfo>,
    /// Target source dialect; survives reset.
    pub dialect: Dialect,
}

impl ConversationState {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Whether the stage change is in the transition table.
    pub fn can_transition(from: ConversationStage, to: ConversationStage) -> bool {
        use ConversationStage::*;
        match (from, to) {
            (_, Idle) => true,
            (Idle | Error | Completed, Analyzing) => true,
            (Analyzing, ReadyToGenerate) => true,
            (ReadyToGenerate | Completed, Generating) => true,
            (Generating, Completed) => true,
            (from, Error) => from != Idle,
            _ => false,
        }
    }

    /// Moves to `to`, returning whether the stage actually changed.
    ///
    /// Reassigning the current stage is a no-op (`Ok(false)`) so observers
    /// are only notified on real transitions.
    ///
    /// # Errors
    ///
    /// Returns a state error when the transition is not in the table.
    pub fn transition(&mut self, to: ConversationStage) -> Result<bool> {
        if self.stage == to {
            return Ok(false);
        }
        if !Self::can_transition(self.stage, to) {
            return Err(AtelierError::state(
                self.stage.to_string(),
                format!("transition to {to}"),
            ));
        }
        self.stage = to;
        Ok(true)
    }

    /// Back to idle, discarding everything except the dialect preference.
    pub fn reset(&mut self) {
        let dialect = self.dialect;
        *self = Self::new(dialect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationStage::*;

    #[test]
    fn test_happy_path_is_legal() {
        let mut state = ConversationState::default();
        for stage in [Analyzing, ReadyToGenerate, Generating, Completed] {
            assert!(state.transition(stage).unwrap());
        }
        // Continuation from completed.
        assert!(state.transition(Generating).unwrap());
    }

    #[test]
    fn test_idle_cannot_jump_to_generating() {
        let mut state = ConversationState::default();
        let result = state.transition(Generating);
        assert!(matches!(result, Err(err) if err.is_state()));
        assert_eq!(state.stage, Idle);
    }

    #[test]
    fn test_error_reachable_from_every_non_idle_stage() {
        for from in [Analyzing, ReadyToGenerate, Generating, Completed] {
            assert!(ConversationState::can_transition(from, Error));
        }
        assert!(!ConversationState::can_transition(Idle, Error));
    }

    #[test]
    fn test_error_restarts_through_analyzing() {
        let mut state = ConversationState::default();
        state.transition(Analyzing).unwrap();
        state.transition(Error).unwrap();
        assert!(state.transition(Analyzing).unwrap());
        assert!(!ConversationState::can_transition(Error, Generating));
    }

    #[test]
    fn test_same_stage_is_silent_noop() {
        let mut state = ConversationState::default();
        state.transition(Analyzing).unwrap();
        assert!(!state.transition(Analyzing).unwrap());
    }

    #[test]
    fn test_reset_keeps_dialect() {
        let mut state = ConversationState::new(Dialect::PlainMarkup);
        state.transition(Analyzing).unwrap();
        state.requirement = Some("a page".into());
        state.reset();
        assert_eq!(state.stage, Idle);
        assert_eq!(state.dialect, Dialect::PlainMarkup);
        assert!(state.requirement.is_none());
    }
}
