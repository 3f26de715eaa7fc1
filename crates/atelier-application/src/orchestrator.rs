//! The conversation orchestrator.
//!
//! Sequences analyzer → generator → repair → sandbox render for one
//! conversation. Constructed explicitly with its collaborators; there is
//! no shared module-level instance, so independent conversations and tests
//! never interfere. Observers subscribe to a broadcast event channel.

use crate::state::ConversationState;
use atelier_core::client::ModelClient;
use atelier_core::collaborators::TemplateInfo;
use atelier_core::config::ModelOptions;
use atelier_core::dialect::Dialect;
use atelier_core::error::{AtelierError, Result};
use atelier_core::session::{Session, SessionRing};
use atelier_core::stage::ConversationStage;
use atelier_interaction::analyzer::{AnalyzerEvent, RequirementAnalyzer};
use atelier_interaction::session::{GenerationEvent, GenerationSession};
use atelier_sandbox::render::{RenderScheduler, RenderStatus};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};

/// Completed sessions retained for summarization.
const SESSION_RING_CAPACITY: usize = 5;
/// Broadcast buffer; slow observers miss events rather than block the
/// pipeline.
const EVENT_CAPACITY: usize = 64;

/// Events published while a conversation progresses.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// The stage actually changed. Never fired for same-stage reassignment.
    StageChanged {
        from: ConversationStage,
        to: ConversationStage,
    },
    /// The analyzer produced a text delta.
    AnalysisDelta { delta: String },
    /// The generator produced a raw source delta.
    GenerationChunk { delta: String },
    /// A sandbox render finished for the given session.
    RenderCompleted {
        session_id: String,
        preview_available: bool,
    },
    /// Something in the pipeline failed; `stage` is where the conversation
    /// stands afterwards. Stream failures land it in the error stage, ready
    /// for a new requirement; a failed render of already-committed source
    /// leaves it completed with the preview unavailable.
    Failed {
        stage: ConversationStage,
        reason: String,
    },
}

type SharedState = Arc<RwLock<ConversationState>>;
type Events = broadcast::Sender<OrchestratorEvent>;

/// Drives one conversation through the pipeline.
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    analyzer: RequirementAnalyzer,
    scheduler: Arc<RenderScheduler>,
    options: ModelOptions,
    state: SharedState,
    session: Arc<RwLock<Option<Arc<GenerationSession>>>>,
    archive: Arc<RwLock<SessionRing>>,
    events: Events,
}

impl Orchestrator {
    /// Creates an orchestrator over the given model client and renderer.
    pub fn new(client: Arc<dyn ModelClient>, scheduler: Arc<RenderScheduler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            analyzer: RequirementAnalyzer::new(client.clone()),
            client,
            scheduler,
            options: ModelOptions::default(),
            state: Arc::new(RwLock::new(ConversationState::default())),
            session: Arc::new(RwLock::new(None)),
            archive: Arc::new(RwLock::new(SessionRing::new(SESSION_RING_CAPACITY))),
            events,
        }
    }

    /// Sets the target source dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.state = Arc::new(RwLock::new(ConversationState::new(dialect)));
        self
    }

    /// Sets per-call model options for both analyzer and generator.
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.analyzer = RequirementAnalyzer::new(self.client.clone()).with_options(options.clone());
        self.options = options;
        self
    }

    /// Subscribes to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Current stage.
    pub async fn stage(&self) -> ConversationStage {
        self.state.read().await.stage
    }

    /// Snapshot of the full conversation state.
    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Selects (or clears) the template seeding the next generation.
    pub async fn select_template(&self, template: Option<TemplateInfo>) {
        self.state.write().await.template = template;
    }

    /// Sessions archived from earlier requirements, oldest first.
    pub async fn recent_sessions(&self) -> Vec<Session> {
        self.archive.read().await.iter().cloned().collect()
    }

    /// Submits a fresh requirement and starts the analyzer.
    ///
    /// # Errors
    ///
    /// Rejected while analyzing or generating; legal from idle, error and
    /// completed stages.
    pub async fn submit_requirement(&self, requirement: &str) -> Result<()> {
        let (from, previous, template) = {
            let mut state = self.state.write().await;
            if !matches!(
                state.stage,
                ConversationStage::Idle | ConversationStage::Error | ConversationStage::Completed
            ) {
                return Err(AtelierError::state(
                    state.stage.to_string(),
                    "submit requirement",
                ));
            }
            let from = state.stage;
            state.transition(ConversationStage::Analyzing)?;
            state.requirement = Some(requirement.to_string());
            state.analysis = None;
            (from, state.session.take(), state.template.clone())
        };
        self.retire(previous).await;
        let _ = self.events.send(OrchestratorEvent::StageChanged {
            from,
            to: ConversationStage::Analyzing,
        });

        let rx = match self.analyzer.analyze(requirement, template.as_ref()).await {
            Ok(rx) => rx,
            Err(err) => {
                fail(&self.state, &self.events, err.to_string()).await;
                return Err(err);
            }
        };
        self.spawn_analysis_consumer(rx);
        Ok(())
    }

    /// Starts the first generation pass for the stored analysis.
    pub async fn request_generation(&self) -> Result<()> {
        let (analysis, template, requirement, dialect) = {
            let state = self.state.read().await;
            if state.stage != ConversationStage::ReadyToGenerate {
                return Err(AtelierError::state(
                    state.stage.to_string(),
                    "request generation",
                ));
            }
            let analysis = state
                .analysis
                .clone()
                .ok_or_else(|| AtelierError::internal("ready to generate without an analysis"))?;
            (
                analysis,
                state.template.clone(),
                state.requirement.clone().unwrap_or_default(),
                state.dialect,
            )
        };

        let session = Arc::new(
            GenerationSession::new(self.client.clone(), dialect, &requirement)
                .with_options(self.options.clone()),
        );
        let rx = match session.generate(&analysis, template.as_ref()).await {
            Ok(rx) => rx,
            Err(err) => {
                fail(&self.state, &self.events, err.to_string()).await;
                return Err(err);
            }
        };
        *self.session.write().await = Some(session.clone());
        advance(&self.state, &self.events, ConversationStage::Generating).await;
        self.spawn_generation_consumer(session, rx, dialect);
        Ok(())
    }

    /// Continues the completed session with a modification request.
    pub async fn continue_generation(&self, user_message: &str) -> Result<()> {
        let dialect = {
            let state = self.state.read().await;
            if state.stage != ConversationStage::Completed {
                return Err(AtelierError::state(
                    state.stage.to_string(),
                    "continue generation",
                ));
            }
            state.dialect
        };
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| AtelierError::internal("completed stage without a session"))?;

        let rx = match session.continue_generation(user_message).await {
            Ok(rx) => rx,
            Err(err) => {
                fail(&self.state, &self.events, err.to_string()).await;
                return Err(err);
            }
        };
        advance(&self.state, &self.events, ConversationStage::Generating).await;
        self.spawn_generation_consumer(session, rx, dialect);
        Ok(())
    }

    /// Discards the live session and analysis, keeping only the dialect.
    pub async fn reset(&self) {
        let (from, previous) = {
            let mut state = self.state.write().await;
            let from = state.stage;
            let previous = state.session.take();
            state.reset();
            (from, previous)
        };
        self.retire(previous).await;
        *self.session.write().await = None;
        if from != ConversationStage::Idle {
            let _ = self.events.send(OrchestratorEvent::StageChanged {
                from,
                to: ConversationStage::Idle,
            });
        }
    }

    async fn retire(&self, previous: Option<Session>) {
        if let Some(previous) = previous {
            self.archive.write().await.push(previous);
        }
    }

    fn spawn_analysis_consumer(&self, mut rx: mpsc::Receiver<AnalyzerEvent>) {
        let state = self.state.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    AnalyzerEvent::Delta { delta, analysis } => {
                        state.write().await.analysis = Some(analysis);
                        let _ = events.send(OrchestratorEvent::AnalysisDelta { delta });
                    }
                    AnalyzerEvent::Completed(analysis) => {
                        state.write().await.analysis = Some(analysis);
                        advance(&state, &events, ConversationStage::ReadyToGenerate).await;
                    }
                    AnalyzerEvent::Failed(reason) => {
                        fail(&state, &events, reason).await;
                    }
                }
            }
        });
    }

    fn spawn_generation_consumer(
        &self,
        session: Arc<GenerationSession>,
        mut rx: mpsc::Receiver<GenerationEvent>,
        dialect: Dialect,
    ) {
        let state = self.state.clone();
        let events = self.events.clone();
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    GenerationEvent::Chunk(delta) => {
                        let _ = events.send(OrchestratorEvent::GenerationChunk { delta });
                    }
                    GenerationEvent::Completed {
                        session: snapshot,
                        outcome: _,
                    } => {
                        state.write().await.session = Some(snapshot.clone());
                        advance(&state, &events, ConversationStage::Completed).await;

                        let request = scheduler.issue(&snapshot.generated_code, dialect, false);
                        match scheduler.render(request).await {
                            Ok(RenderStatus::Superseded) => {
                                debug!(session_id = %snapshot.id, "render superseded");
                            }
                            Ok(status) => {
                                let available = status.preview_available();
                                session.set_preview_available(available).await;
                                if let Some(live) = state.write().await.session.as_mut() {
                                    live.preview_available = available;
                                }
                                let _ = events.send(OrchestratorEvent::RenderCompleted {
                                    session_id: snapshot.id.clone(),
                                    preview_available: available,
                                });
                            }
                            Err(err) => {
                                warn!(%err, "sandbox render failed");
                                let _ = events.send(OrchestratorEvent::Failed {
                                    stage: ConversationStage::Completed,
                                    reason: err.to_string(),
                                });
                            }
                        }
                    }
                    GenerationEvent::Failed(reason) => {
                        fail(&state, &events, reason).await;
                    }
                }
            }
        });
    }
}

async fn advance(state: &SharedState, events: &Events, to: ConversationStage) {
    let outcome = {
        let mut guard = state.write().await;
        let from = guard.stage;
        guard.transition(to).map(|changed| (from, changed))
    };
    match outcome {
        Ok((from, true)) => {
            let _ = events.send(OrchestratorEvent::StageChanged { from, to });
        }
        Ok((_, false)) => {}
        Err(err) => warn!(%err, %to, "stage transition rejected"),
    }
}

async fn fail(state: &SharedState, events: &Events, reason: String) {
    let (stage, changed) = {
        let mut guard = state.write().await;
        let stage = guard.stage;
        let changed = guard.transition(ConversationStage::Error).unwrap_or(false);
        (stage, changed)
    };
    if changed {
        let _ = events.send(OrchestratorEvent::StageChanged {
            from: stage,
            to: ConversationStage::Error,
        });
    }
    let _ = events.send(OrchestratorEvent::Failed { stage, reason });
}
