//! Render scheduling with supersession.
//!
//! Render requests carry a monotonically increasing id; only the newest is
//! live. A render whose id has been superseded abandons itself silently at
//! every checkpoint rather than mutating the context a newer render owns.

use crate::host::ExecutionHost;
use crate::shell;
use atelier_core::collaborators::{CompileFailure, ComponentCompiler};
use atelier_core::dialect::Dialect;
use atelier_core::error::Result;
use atelier_repair::RepairCompiler;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Pause before touching the context, letting host state settle.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// One render attempt. Only the most recently issued request is live.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Monotonic correlation id.
    pub id: u64,
    /// Source to execute.
    pub source: String,
    /// Declared source dialect.
    pub dialect: Dialect,
    /// Render even if the source matches the last rendered one.
    pub force: bool,
}

/// How a render attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStatus {
    /// The source is live in the context.
    Completed,
    /// A newer request was issued; this one was abandoned.
    Superseded,
    /// Source identical to the last rendered one and not forced.
    Unchanged,
    /// The out-of-process compiler rejected the source; a diagnostic panel
    /// was rendered instead.
    CompileError(CompileFailure),
    /// The loaded source threw during evaluation; a diagnostic panel was
    /// rendered instead.
    RuntimeError(String),
}

impl RenderStatus {
    /// Whether the session's preview may be marked available.
    pub fn preview_available(&self) -> bool {
        matches!(self, RenderStatus::Completed | RenderStatus::Unchanged)
    }
}

/// Drives renders against a single execution context.
pub struct RenderScheduler {
    host: Arc<dyn ExecutionHost>,
    compiler: Arc<dyn ComponentCompiler>,
    libraries: Vec<String>,
    counter: AtomicU64,
    settle: Duration,
    last_rendered: RwLock<Option<String>>,
}

impl RenderScheduler {
    pub fn new(host: Arc<dyn ExecutionHost>, compiler: Arc<dyn ComponentCompiler>) -> Self {
        Self {
            host,
            compiler,
            libraries: Vec::new(),
            counter: AtomicU64::new(0),
            settle: SETTLE_DELAY,
            last_rendered: RwLock::new(None),
        }
    }

    /// Libraries passed through to the component compiler.
    pub fn with_libraries(mut self, libraries: Vec<String>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Overrides the settle delay (tests use a shorter one).
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Issues a new render request, superseding every earlier one.
    pub fn issue(&self, source: impl Into<String>, dialect: Dialect, force: bool) -> RenderRequest {
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        RenderRequest {
            id,
            source: source.into(),
            dialect,
            force,
        }
    }

    fn is_stale(&self, id: u64) -> bool {
        id != self.counter.load(Ordering::SeqCst)
    }

    /// Runs one render attempt to completion or abandonment.
    ///
    /// Staleness is re-checked after the context clear, after the settle
    /// delay, after the compile returns and before the final load; an
    /// abandoned render returns
    /// [`RenderStatus::Superseded`] without touching the context further.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderStatus> {
        if self.is_stale(request.id) {
            debug!(id = request.id, "render superseded before start");
            return Ok(RenderStatus::Superseded);
        }
        if !request.force
            && self.last_rendered.read().await.as_deref() == Some(request.source.as_str())
        {
            debug!(id = request.id, "source unchanged, skipping render");
            return Ok(RenderStatus::Unchanged);
        }

        self.host.clear().await?;
        if self.is_stale(request.id) {
            debug!(id = request.id, "render superseded after clear");
            return Ok(RenderStatus::Superseded);
        }

        tokio::time::sleep(self.settle).await;
        if self.is_stale(request.id) {
            debug!(id = request.id, "render superseded after settle");
            return Ok(RenderStatus::Superseded);
        }

        let document = match request.dialect {
            Dialect::PlainMarkup => shell::plain_document(&request.source),
            Dialect::ComponentMarkup => {
                let compiled = self.compiler.compile(&request.source, &self.libraries).await?;
                if self.is_stale(request.id) {
                    debug!(id = request.id, "render superseded after compile");
                    return Ok(RenderStatus::Superseded);
                }
                match compiled {
                    Ok(bundle) => {
                        let name = RepairCompiler::detect_component_name(&request.source);
                        shell::component_document(&name, &bundle.compiled_code)?
                    }
                    Err(failure) => {
                        self.host
                            .load(&shell::diagnostic_document(
                                "Compile error",
                                &failure.to_string(),
                                failure.suggestion.as_deref(),
                            ))
                            .await?;
                        return Ok(RenderStatus::CompileError(failure));
                    }
                }
            }
        };

        if self.is_stale(request.id) {
            debug!(id = request.id, "render superseded before load");
            return Ok(RenderStatus::Superseded);
        }
        self.host.load(&document).await?;

        if let Some(message) = self.host.runtime_error().await {
            self.host
                .load(&shell::diagnostic_document("Runtime error", &message, None))
                .await?;
            return Ok(RenderStatus::RuntimeError(message));
        }

        *self.last_rendered.write().await = Some(request.source.clone());
        info!(id = request.id, dialect = %request.dialect, "render completed");
        Ok(RenderStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InProcessHost;
    use async_trait::async_trait;
    use atelier_core::collaborators::CompiledBundle;

    struct StaticCompiler(std::result::Result<CompiledBundle, CompileFailure>);

    impl StaticCompiler {
        fn passing(code: &str) -> Arc<Self> {
            Arc::new(Self(Ok(CompiledBundle {
                compiled_code: code.to_string(),
                dependencies: vec![],
                hash: "h".into(),
                cached: false,
            })))
        }

        fn failing(message: &str, suggestion: Option<&str>) -> Arc<Self> {
            Arc::new(Self(Err(CompileFailure {
                message: message.to_string(),
                category: "syntax".into(),
                suggestion: suggestion.map(str::to_string),
            })))
        }
    }

    #[async_trait]
    impl ComponentCompiler for StaticCompiler {
        async fn compile(
            &self,
            _source: &str,
            _libraries: &[String],
        ) -> Result<std::result::Result<CompiledBundle, CompileFailure>> {
            Ok(self.0.clone())
        }
    }

    struct SlowCompiler {
        inner: Arc<StaticCompiler>,
        delay: Duration,
    }

    #[async_trait]
    impl ComponentCompiler for SlowCompiler {
        async fn compile(
            &self,
            source: &str,
            libraries: &[String],
        ) -> Result<std::result::Result<CompiledBundle, CompileFailure>> {
            tokio::time::sleep(self.delay).await;
            self.inner.compile(source, libraries).await
        }
    }

    fn scheduler(host: Arc<InProcessHost>) -> Arc<RenderScheduler> {
        Arc::new(
            RenderScheduler::new(host, StaticCompiler::passing("var x = 1;"))
                .with_settle_delay(Duration::from_millis(30)),
        )
    }

    #[tokio::test]
    async fn test_only_newest_of_three_renders() {
        let host = Arc::new(InProcessHost::new());
        let scheduler = scheduler(host.clone());

        let r1 = scheduler.issue("<html><body>v1</body></html>", Dialect::PlainMarkup, false);
        let s1 = scheduler.clone();
        let h1 = tokio::spawn(async move { s1.render(r1).await.unwrap() });
        tokio::time::sleep(Duration::from_millis(5)).await;

        let r2 = scheduler.issue("<html><body>v2</body></html>", Dialect::PlainMarkup, false);
        let s2 = scheduler.clone();
        let h2 = tokio::spawn(async move { s2.render(r2).await.unwrap() });
        tokio::time::sleep(Duration::from_millis(5)).await;

        let r3 = scheduler.issue("<html><body>v3</body></html>", Dialect::PlainMarkup, false);
        let status3 = scheduler.render(r3).await.unwrap();

        assert_eq!(h1.await.unwrap(), RenderStatus::Superseded);
        assert_eq!(h2.await.unwrap(), RenderStatus::Superseded);
        assert_eq!(status3, RenderStatus::Completed);
        assert!(host.document().await.unwrap().contains("v3"));
        assert_eq!(host.load_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_of_two_quick_renders_wins() {
        let host = Arc::new(InProcessHost::new());
        let scheduler = scheduler(host.clone());

        let r5 = scheduler.issue("<html><body>five</body></html>", Dialect::PlainMarkup, false);
        let s5 = scheduler.clone();
        let h5 = tokio::spawn(async move { s5.render(r5).await.unwrap() });
        tokio::time::sleep(Duration::from_millis(5)).await;

        let r6 = scheduler.issue("<html><body>six</body></html>", Dialect::PlainMarkup, false);
        let status6 = scheduler.render(r6).await.unwrap();

        assert_eq!(h5.await.unwrap(), RenderStatus::Superseded);
        assert_eq!(status6, RenderStatus::Completed);
        let document = host.document().await.unwrap();
        assert!(document.contains("six"));
        assert!(!document.contains("five"));
        assert_eq!(host.load_count().await, 1);
    }

    #[tokio::test]
    async fn test_component_render_wraps_compiled_output() {
        let host = Arc::new(InProcessHost::new());
        let compiler = StaticCompiler::passing("function Dashboard() { return null; }");
        let scheduler = RenderScheduler::new(host.clone(), compiler)
            .with_settle_delay(Duration::from_millis(1));

        let source = "export default function Dashboard() { return <div/>; }";
        let request = scheduler.issue(source, Dialect::ComponentMarkup, false);
        let status = scheduler.render(request).await.unwrap();

        assert_eq!(status, RenderStatus::Completed);
        let document = host.document().await.unwrap();
        assert!(document.contains("function Dashboard() { return null; }"));
        assert!(document.contains("React.createElement(Dashboard)"));
    }

    #[tokio::test]
    async fn test_compile_failure_renders_diagnostic_panel() {
        let host = Arc::new(InProcessHost::new());
        let compiler = StaticCompiler::failing("unexpected token", Some("close the tag"));
        let scheduler = RenderScheduler::new(host.clone(), compiler)
            .with_settle_delay(Duration::from_millis(1));

        let request = scheduler.issue("export default broken(", Dialect::ComponentMarkup, false);
        let status = scheduler.render(request).await.unwrap();

        match status {
            RenderStatus::CompileError(ref failure) => {
                assert_eq!(failure.message, "unexpected token");
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert!(!status.preview_available());
        let document = host.document().await.unwrap();
        assert!(document.contains("unexpected token"));
        assert!(document.contains("close the tag"));
    }

    #[tokio::test]
    async fn test_stale_compile_failure_does_not_clobber_newer_render() {
        let host = Arc::new(InProcessHost::new());
        let compiler = Arc::new(SlowCompiler {
            inner: StaticCompiler::failing("stale compile error", None),
            delay: Duration::from_millis(100),
        });
        let scheduler = Arc::new(
            RenderScheduler::new(host.clone(), compiler)
                .with_settle_delay(Duration::from_millis(1)),
        );

        let r1 = scheduler.issue("export default broken(", Dialect::ComponentMarkup, false);
        let s1 = scheduler.clone();
        let h1 = tokio::spawn(async move { s1.render(r1).await.unwrap() });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let r2 = scheduler.issue("<html><body>fresh</body></html>", Dialect::PlainMarkup, false);
        let status2 = scheduler.render(r2).await.unwrap();

        assert_eq!(status2, RenderStatus::Completed);
        assert_eq!(h1.await.unwrap(), RenderStatus::Superseded);
        let document = host.document().await.unwrap();
        assert!(document.contains("fresh"));
        assert!(!document.contains("stale compile error"));
        assert_eq!(host.load_count().await, 1);
    }

    #[tokio::test]
    async fn test_runtime_error_renders_diagnostic_panel() {
        let host = Arc::new(InProcessHost::new());
        let scheduler = RenderScheduler::new(host.clone(), StaticCompiler::passing(""))
            .with_settle_delay(Duration::from_millis(1));
        host.script_runtime_error("x is not defined").await;

        let request = scheduler.issue("<html><body>boom</body></html>", Dialect::PlainMarkup, false);
        let status = scheduler.render(request).await.unwrap();

        assert_eq!(status, RenderStatus::RuntimeError("x is not defined".into()));
        assert!(!status.preview_available());
        assert!(host.document().await.unwrap().contains("x is not defined"));
    }

    #[tokio::test]
    async fn test_unchanged_source_skipped_unless_forced() {
        let host = Arc::new(InProcessHost::new());
        let scheduler = RenderScheduler::new(host.clone(), StaticCompiler::passing(""))
            .with_settle_delay(Duration::from_millis(1));

        let source = "<html><body>same</body></html>";
        let first = scheduler.issue(source, Dialect::PlainMarkup, false);
        assert_eq!(scheduler.render(first).await.unwrap(), RenderStatus::Completed);

        let repeat = scheduler.issue(source, Dialect::PlainMarkup, false);
        assert_eq!(scheduler.render(repeat).await.unwrap(), RenderStatus::Unchanged);
        assert_eq!(host.load_count().await, 1);

        let forced = scheduler.issue(source, Dialect::PlainMarkup, true);
        assert_eq!(scheduler.render(forced).await.unwrap(), RenderStatus::Completed);
        assert_eq!(host.load_count().await, 2);
    }
}
