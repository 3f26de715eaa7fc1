//! Code generation session: streaming generation over a bounded
//! conversation history, with repair applied before source is committed.

use crate::prompts;
use atelier_core::analysis::Analysis;
use atelier_core::client::{ModelClient, StreamEvent};
use atelier_core::collaborators::TemplateInfo;
use atelier_core::config::ModelOptions;
use atelier_core::dialect::Dialect;
use atelier_core::error::{AtelierError, Result};
use atelier_core::message::{ChatMessage, ConversationMessage, MessageRole};
use atelier_core::session::{Session, SessionStatus};
use atelier_repair::{RepairCompiler, RepairOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

/// Stored history is trimmed once it grows past this many turns...
const HISTORY_TRIM_THRESHOLD: usize = 8;
/// ...down to the most recent this many. Context sent to the model is
/// always capped at this many turns, whatever the stored length.
const HISTORY_TRIM_TO: usize = 6;

/// Events emitted while a generation streams.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// A raw source chunk, before any repair.
    Chunk(String),
    /// Generation finished; `session` reflects the committed source and
    /// `outcome` describes what repair did to it.
    Completed {
        session: Session,
        outcome: RepairOutcome,
    },
    /// The stream failed; the session is left in the error state.
    Failed(String),
}

/// One generation lifecycle over a single [`Session`].
///
/// Supports a first pass seeded from an [`Analysis`] and iterative
/// continuation seeded from the current generated source. At most one
/// generation is in flight at a time; callers check
/// [`can_start_generation`](Self::can_start_generation) first.
pub struct GenerationSession {
    client: Arc<dyn ModelClient>,
    repair: Arc<RepairCompiler>,
    dialect: Dialect,
    options: ModelOptions,
    state: Arc<RwLock<Session>>,
    in_flight: Arc<AtomicBool>,
}

impl GenerationSession {
    /// Creates a fresh session for `requirement`.
    pub fn new(client: Arc<dyn ModelClient>, dialect: Dialect, requirement: &str) -> Self {
        Self {
            client,
            repair: Arc::new(RepairCompiler::new()),
            dialect,
            options: ModelOptions::default(),
            state: Arc::new(RwLock::new(Session::new(requirement))),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides per-call model options.
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the repair compiler (custom rule tables).
    pub fn with_repair(mut self, repair: RepairCompiler) -> Self {
        self.repair = Arc::new(repair);
        self
    }

    /// Whether a new generation may be started right now.
    pub fn can_start_generation(&self) -> bool {
        !self.in_flight.load(Ordering::SeqCst)
    }

    /// Current session state.
    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    /// The history that would be sent to the model on the next call.
    pub async fn context_messages(&self) -> Vec<ChatMessage> {
        let state = self.state.read().await;
        recent_turns(&state.history)
            .iter()
            .map(|m| m.to_chat_message())
            .collect()
    }

    /// Marks whether a render of the committed source succeeded.
    pub async fn set_preview_available(&self, available: bool) {
        self.state.write().await.preview_available = available;
    }

    /// Starts the first generation pass, seeded from a completed analysis
    /// and optionally a gallery template.
    ///
    /// # Errors
    ///
    /// Returns a state error if a generation is already in flight.
    pub async fn generate(
        &self,
        analysis: &Analysis,
        template: Option<&TemplateInfo>,
    ) -> Result<mpsc::Receiver<GenerationEvent>> {
        {
            let mut state = self.state.write().await;
            state.analysis_id = Some(analysis.id.clone());
            state.template_id = template.map(|t| t.id.clone());
        }
        let user_content = prompts::generation_user_prompt(analysis, template);
        self.start(prompts::generation_system_prompt(self.dialect), user_content)
            .await
    }

    /// Starts an iterative modification pass, seeded from the current
    /// generated source.
    ///
    /// # Errors
    ///
    /// Returns a state error if a generation is already in flight or no
    /// source has been generated yet.
    pub async fn continue_generation(
        &self,
        user_message: &str,
    ) -> Result<mpsc::Receiver<GenerationEvent>> {
        let current = {
            let state = self.state.read().await;
            if state.generated_code.is_empty() {
                return Err(AtelierError::state("idle", "continue"));
            }
            state.generated_code.clone()
        };
        let user_content =
            format!("Current source:\n{current}\n\nRequested change: {user_message}");
        self.start(prompts::continuation_system_prompt(), user_content)
            .await
    }

    async fn start(
        &self,
        system_prompt: &str,
        user_content: String,
    ) -> Result<mpsc::Receiver<GenerationEvent>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AtelierError::state("generating", "generate"));
        }

        let messages = {
            let mut state = self.state.write().await;
            state
                .history
                .push(ConversationMessage::now(MessageRole::User, &user_content));
            trim_history(&mut state.history);
            state.status = SessionStatus::Generating;
            state.preview_available = false;

            let mut messages = vec![ChatMessage::system(system_prompt)];
            messages.extend(recent_turns(&state.history).iter().map(|m| m.to_chat_message()));
            messages
        };

        let stream = match self.client.stream(&messages, &self.options).await {
            Ok(stream) => stream,
            Err(err) => {
                self.in_flight.store(false, Ordering::SeqCst);
                self.state.write().await.status = SessionStatus::Error;
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(32);
        let state = self.state.clone();
        let in_flight = self.in_flight.clone();
        let repair = self.repair.clone();
        let dialect = self.dialect;

        tokio::spawn(async move {
            let mut stream = stream;
            let mut accumulated = String::new();
            loop {
                let Some(event) = stream.next_event().await else {
                    fail(&state, &in_flight, &tx, "generation stream ended unexpectedly").await;
                    return;
                };
                match event {
                    StreamEvent::Chunk(delta) => {
                        accumulated.push_str(&delta);
                        if tx.send(GenerationEvent::Chunk(delta)).await.is_err() {
                            in_flight.store(false, Ordering::SeqCst);
                            return;
                        }
                    }
                    StreamEvent::Done => {
                        let outcome = repair.repair(&accumulated, dialect);
                        info!(
                            fixes = outcome.fixes.len(),
                            parse_ok = outcome.parse_ok,
                            "generation completed"
                        );
                        let snapshot = {
                            let mut session = state.write().await;
                            session.generated_code = outcome.code.clone();
                            session.history.push(ConversationMessage::now(
                                MessageRole::Assistant,
                                &outcome.code,
                            ));
                            trim_history(&mut session.history);
                            session.status = SessionStatus::Completed;
                            session.clone()
                        };
                        in_flight.store(false, Ordering::SeqCst);
                        let _ = tx
                            .send(GenerationEvent::Completed {
                                session: snapshot,
                                outcome,
                            })
                            .await;
                        return;
                    }
                    StreamEvent::Error(reason) => {
                        debug!(%reason, "generation stream failed");
                        fail(&state, &in_flight, &tx, &reason).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

async fn fail(
    state: &Arc<RwLock<Session>>,
    in_flight: &Arc<AtomicBool>,
    tx: &mpsc::Sender<GenerationEvent>,
    reason: &str,
) {
    state.write().await.status = SessionStatus::Error;
    in_flight.store(false, Ordering::SeqCst);
    let _ = tx.send(GenerationEvent::Failed(reason.to_string())).await;
}

fn trim_history(history: &mut Vec<ConversationMessage>) {
    if history.len() > HISTORY_TRIM_THRESHOLD {
        let excess = history.len() - HISTORY_TRIM_TO;
        history.drain(..excess);
    }
}

/// The most recent turns, capped at the context bound.
fn recent_turns(history: &[ConversationMessage]) -> &[ConversationMessage] {
    let start = history.len().saturating_sub(HISTORY_TRIM_TO);
    &history[start..]
}
