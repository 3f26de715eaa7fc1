//! Generation session domain model.
//!
//! A [`Session`] represents one generation lifecycle: the originating
//! requirement, the conversation history exchanged with the model, and the
//! source accumulated so far. Prior sessions are retained read-only in a
//! small [`SessionRing`] for summarization.

use crate::message::ConversationMessage;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but no generation started yet.
    Idle,
    /// A generation stream is in flight.
    Generating,
    /// The last generation completed and source was committed.
    Completed,
    /// The last generation failed.
    Error,
}

/// One generation lifecycle.
///
/// Owned exclusively by the generation session component; at most one
/// session is "current" at a time. After completion a session is never
/// mutated except for its terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// The requirement that started this session.
    pub requirement: String,
    /// Id of the analysis this session was seeded from, if any.
    pub analysis_id: Option<String>,
    /// Selected template reference, if generation started from a template.
    pub template_id: Option<String>,
    /// Ordered role-tagged conversation history.
    pub history: Vec<ConversationMessage>,
    /// The generated source committed after the last completed generation.
    pub generated_code: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Whether a render of the generated source completed successfully.
    pub preview_available: bool,
    /// Timestamp when the session was created (ISO 8601 format).
    pub created_at: String,
}

impl Session {
    /// Creates a new idle session for the given requirement.
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requirement: requirement.into(),
            analysis_id: None,
            template_id: None,
            history: Vec::new(),
            generated_code: String::new(),
            status: SessionStatus::Idle,
            preview_available: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Fixed-capacity ring of completed sessions, oldest evicted first.
///
/// Retained sessions are read-only; the ring exists so later conversations
/// can be summarized without unbounded growth.
#[derive(Debug, Clone, Default)]
pub struct SessionRing {
    capacity: usize,
    entries: std::collections::VecDeque<Session>,
}

impl SessionRing {
    /// Creates a ring holding at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: std::collections::VecDeque::with_capacity(capacity),
        }
    }

    /// Retains a finished session, evicting the oldest when full.
    pub fn push(&mut self, session: Session) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(session);
    }

    /// Iterates retained sessions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.entries.iter()
    }

    /// Number of retained sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
