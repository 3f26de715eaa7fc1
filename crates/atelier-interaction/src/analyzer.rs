//! Requirement analyzer: one streaming call per requirement.

use crate::prompts;
use atelier_core::analysis::Analysis;
use atelier_core::client::{ModelClient, StreamEvent};
use atelier_core::collaborators::TemplateInfo;
use atelier_core::config::ModelOptions;
use atelier_core::error::Result;
use atelier_core::message::ChatMessage;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Analyses retained for later summarization; oldest evicted first.
const ANALYSIS_HISTORY_CAPACITY: usize = 6;

/// Events emitted while an analysis streams.
#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
    /// A text delta arrived. Carries both the delta and the accumulated
    /// analysis so consumers never re-derive it.
    Delta { delta: String, analysis: Analysis },
    /// The stream finished; the analysis is final and immutable.
    Completed(Analysis),
    /// The stream failed. No retry is attempted; the caller decides.
    Failed(String),
}

/// Turns a user requirement into a structured analysis via one streaming
/// model call.
pub struct RequirementAnalyzer {
    client: Arc<dyn ModelClient>,
    options: ModelOptions,
    history: Arc<RwLock<VecDeque<Analysis>>>,
}

impl RequirementAnalyzer {
    /// Creates an analyzer over the given model client.
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            options: ModelOptions::default(),
            history: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Overrides per-call model options.
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Starts analyzing `requirement`, returning the event stream.
    ///
    /// The returned channel yields deltas in arrival order followed by
    /// exactly one terminal event.
    pub async fn analyze(
        &self,
        requirement: &str,
        template: Option<&TemplateInfo>,
    ) -> Result<mpsc::Receiver<AnalyzerEvent>> {
        let messages = vec![
            ChatMessage::system(prompts::ANALYZER_SYSTEM_PROMPT),
            ChatMessage::user(prompts::analyzer_user_prompt(requirement, template)),
        ];
        let mut stream = self.client.stream(&messages, &self.options).await?;

        let (tx, rx) = mpsc::channel(32);
        let history = self.history.clone();
        let mut analysis = Analysis::new(requirement);

        tokio::spawn(async move {
            while let Some(event) = stream.next_event().await {
                match event {
                    StreamEvent::Chunk(delta) => {
                        analysis.append(&delta);
                        let update = AnalyzerEvent::Delta {
                            delta,
                            analysis: analysis.clone(),
                        };
                        if tx.send(update).await.is_err() {
                            return;
                        }
                    }
                    StreamEvent::Done => {
                        analysis.complete();
                        retain(&history, analysis.clone()).await;
                        let _ = tx.send(AnalyzerEvent::Completed(analysis)).await;
                        return;
                    }
                    StreamEvent::Error(reason) => {
                        debug!(%reason, "analysis stream failed");
                        analysis.fail(reason.clone());
                        retain(&history, analysis).await;
                        let _ = tx.send(AnalyzerEvent::Failed(reason)).await;
                        return;
                    }
                }
            }
            // Producer went away without a terminal event; treat as failure.
            analysis.fail("analysis stream ended unexpectedly");
            retain(&history, analysis).await;
            let _ = tx
                .send(AnalyzerEvent::Failed(
                    "analysis stream ended unexpectedly".to_string(),
                ))
                .await;
        });

        Ok(rx)
    }

    /// Recently finished analyses, oldest first. At most
    /// [`ANALYSIS_HISTORY_CAPACITY`] entries are retained.
    pub async fn recent(&self) -> Vec<Analysis> {
        self.history.read().await.iter().cloned().collect()
    }
}

async fn retain(history: &Arc<RwLock<VecDeque<Analysis>>>, analysis: Analysis) {
    let mut guard = history.write().await;
    if guard.len() == ANALYSIS_HISTORY_CAPACITY {
        guard.pop_front();
    }
    guard.push_back(analysis);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use atelier_core::analysis::AnalysisStatus;

    async fn drain(mut rx: mpsc::Receiver<AnalyzerEvent>) -> Vec<AnalyzerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_analysis_accumulates_and_completes() {
        let client = Arc::new(ScriptedClient::streaming(vec![vec![
            StreamEvent::Chunk("The user wants ".into()),
            StreamEvent::Chunk("a counter.".into()),
            StreamEvent::Done,
        ]]));
        let analyzer = RequirementAnalyzer::new(client);
        let rx = analyzer.analyze("build a counter", None).await.unwrap();
        let events = drain(rx).await;

        assert_eq!(events.len(), 3);
        match &events[1] {
            AnalyzerEvent::Delta { delta, analysis } => {
                assert_eq!(delta, "a counter.");
                assert_eq!(analysis.content, "The user wants a counter.");
            }
            other => panic!("expected delta, got {other:?}"),
        }
        match &events[2] {
            AnalyzerEvent::Completed(analysis) => {
                assert_eq!(analysis.status, AnalysisStatus::Completed);
                assert_eq!(analysis.requirement, "build a counter");
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_error_surfaces_as_failed() {
        let client = Arc::new(ScriptedClient::streaming(vec![vec![
            StreamEvent::Chunk("partial".into()),
            StreamEvent::Error("connection reset".into()),
        ]]));
        let analyzer = RequirementAnalyzer::new(client);
        let rx = analyzer.analyze("anything", None).await.unwrap();
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(AnalyzerEvent::Failed(reason)) if reason == "connection reset"));

        let recent = analyzer.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, AnalysisStatus::Error);
    }

    #[tokio::test]
    async fn test_history_bounded_to_six() {
        let scripts = (0..8)
            .map(|i| vec![StreamEvent::Chunk(format!("a{i}")), StreamEvent::Done])
            .collect();
        let analyzer = RequirementAnalyzer::new(Arc::new(ScriptedClient::streaming(scripts)));
        for i in 0..8 {
            let rx = analyzer.analyze(&format!("req {i}"), None).await.unwrap();
            drain(rx).await;
        }
        let recent = analyzer.recent().await;
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].requirement, "req 2");
        assert_eq!(recent[5].requirement, "req 7");
    }
}
