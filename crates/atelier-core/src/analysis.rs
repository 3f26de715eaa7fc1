//! Requirement analysis domain model.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a requirement analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The analyzer is still streaming text into this analysis.
    Analyzing,
    /// The stream finished; the analysis is now immutable.
    Completed,
    /// The stream failed; `error` carries the reason.
    Error,
}

/// A structured analysis of a user requirement, accumulated from a single
/// streaming call.
///
/// Mutated only while `status` is [`AnalysisStatus::Analyzing`]; once the
/// status leaves that state the object must be treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Unique analysis identifier (UUID format).
    pub id: String,
    /// The original requirement text this analysis was produced for.
    pub requirement: String,
    /// The accumulated analysis text.
    pub content: String,
    /// Current lifecycle status.
    pub status: AnalysisStatus,
    /// Timestamp when the analysis was started (ISO 8601 format).
    pub created_at: String,
    /// Error message when `status` is `Error`.
    pub error: Option<String>,
}

impl Analysis {
    /// Starts a new, empty analysis for the given requirement.
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requirement: requirement.into(),
            content: String::new(),
            status: AnalysisStatus::Analyzing,
            created_at: chrono::Utc::now().to_rfc3339(),
            error: None,
        }
    }

    /// Appends a streamed delta. Only legal while analyzing.
    pub fn append(&mut self, delta: &str) {
        debug_assert_eq!(self.status, AnalysisStatus::Analyzing);
        self.content.push_str(delta);
    }

    /// Marks the analysis complete.
    pub fn complete(&mut self) {
        self.status = AnalysisStatus::Completed;
    }

    /// Marks the analysis failed with the given reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = AnalysisStatus::Error;
        self.error = Some(reason.into());
    }

    /// Whether the analysis reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status != AnalysisStatus::Analyzing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_accumulates_deltas() {
        let mut analysis = Analysis::new("build a counter");
        analysis.append("The user wants ");
        analysis.append("a counter.");
        assert_eq!(analysis.content, "The user wants a counter.");
        assert_eq!(analysis.status, AnalysisStatus::Analyzing);
    }

    #[test]
    fn test_analysis_terminal_states() {
        let mut ok = Analysis::new("a");
        ok.complete();
        assert!(ok.is_terminal());
        assert!(ok.error.is_none());

        let mut bad = Analysis::new("b");
        bad.fail("stream reset");
        assert!(bad.is_terminal());
        assert_eq!(bad.error.as_deref(), Some("stream reset"));
    }
}
