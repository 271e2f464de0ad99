//! End-to-end curation pipeline: URLs → scrape → architect → editor → HTML.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use lazypack_crawler::ScrapeCoordinator;
use lazypack_shared::{
    AppConfig, ArchitectDraft, CurationRequest, PipelineStatus, Result, RunId, ScrapeConfig,
    SourceRef, StyleConfig,
};

use crate::architect::{self, effective_outline};
use crate::editor;
use crate::generation::Generator;

// ---------------------------------------------------------------------------
// Status reporting
// ---------------------------------------------------------------------------

/// Receives pipeline status changes, synchronously and in order.
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: PipelineStatus);
}

impl<F> StatusReporter for F
where
    F: Fn(PipelineStatus) + Send + Sync,
{
    fn report(&self, status: PipelineStatus) {
        self(status)
    }
}

/// No-op reporter for headless/test usage.
pub struct SilentStatus;

impl StatusReporter for SilentStatus {
    fn report(&self, _status: PipelineStatus) {}
}

/// Forwards only the next legal status; anything else is dropped and logged.
pub struct StatusTracker<'a> {
    reporter: &'a dyn StatusReporter,
    current: PipelineStatus,
}

impl<'a> StatusTracker<'a> {
    pub fn new(reporter: &'a dyn StatusReporter) -> Self {
        Self {
            reporter,
            current: PipelineStatus::Idle,
        }
    }

    pub fn current(&self) -> PipelineStatus {
        self.current
    }

    /// Move to `next` if it directly follows the current status.
    pub fn advance(&mut self, next: PipelineStatus) -> bool {
        if self.current.next() != Some(next) {
            warn!(from = %self.current, to = %next, "refusing out-of-order status");
            return false;
        }
        self.current = next;
        self.reporter.report(next);
        true
    }
}

// ---------------------------------------------------------------------------
// Curator
// ---------------------------------------------------------------------------

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct CurationOutput {
    pub run_id: RunId,
    /// Final article, an HTML fragment.
    pub html: String,
    /// Sources that fed the run, by id.
    pub sources: Vec<SourceRef>,
    /// The accepted content plan.
    pub drafts: Vec<ArchitectDraft>,
    /// URLs attempted and how many of them produced nothing usable.
    pub attempted: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Runs the three-stage curation pipeline against one generator.
pub struct Curator {
    generator: Arc<dyn Generator>,
    coordinator: ScrapeCoordinator,
    style: StyleConfig,
    min_content_chars: usize,
}

impl Curator {
    /// Build from the application config.
    pub fn new(generator: Arc<dyn Generator>, config: &AppConfig) -> Result<Self> {
        Self::with_scrape_config(generator, &ScrapeConfig::from(config), config.style.clone())
    }

    /// Build with explicit runtime scrape settings (CLI overrides, tests).
    pub fn with_scrape_config(
        generator: Arc<dyn Generator>,
        scrape: &ScrapeConfig,
        style: StyleConfig,
    ) -> Result<Self> {
        Ok(Self {
            generator,
            coordinator: ScrapeCoordinator::new(scrape)?,
            style,
            min_content_chars: scrape.min_content_chars,
        })
    }

    /// Run the pipeline and return the article HTML.
    pub async fn curate(
        &self,
        request: &CurationRequest,
        status: &dyn StatusReporter,
    ) -> Result<String> {
        self.curate_detailed(request, status).await.map(|out| out.html)
    }

    /// Run the pipeline and return the article with its run metadata.
    ///
    /// Any stage failure aborts the run; `done` is reported only on success.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, topic = %request.topic, urls = request.urls.len()))]
    pub async fn curate_detailed(
        &self,
        request: &CurationRequest,
        status: &dyn StatusReporter,
    ) -> Result<CurationOutput> {
        let start = Instant::now();
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let mut tracker = StatusTracker::new(status);
        let outline = effective_outline(&request.outline);

        info!(sections = outline.len(), "starting curation");

        // --- Scrape ---
        tracker.advance(PipelineStatus::Scraping);
        let report = self.coordinator.scrape(&request.urls).await?;
        let sources: Vec<SourceRef> = report.sources.iter().map(|s| s.source_ref()).collect();

        // --- Architect ---
        tracker.advance(PipelineStatus::Analyzing);
        let drafts = architect::run_architect(
            self.generator.as_ref(),
            &request.topic,
            &outline,
            &report.sources,
            self.min_content_chars,
        )
        .await?;

        // --- Editor ---
        tracker.advance(PipelineStatus::Writing);
        let html = editor::run_editor(
            self.generator.as_ref(),
            &request.topic,
            &request.intro,
            &drafts,
            &sources,
            &self.style,
        )
        .await?;

        tracker.advance(PipelineStatus::Done);

        let elapsed = start.elapsed();
        info!(
            sources = sources.len(),
            failed = report.failed,
            elapsed_ms = elapsed.as_millis(),
            "curation completed"
        );

        Ok(CurationOutput {
            run_id,
            html,
            sources,
            drafts,
            attempted: report.attempted,
            failed: report.failed,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::editor::citation_line;
    use crate::test_support::ScriptedGenerator;
    use lazypack_shared::LazyPackError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WIDGET_A: &str = r#"<html><head><title>Widget A</title></head><body>
<nav>Shop / Widgets</nav>
<article><h1>Widget A review</h1>
<p>Widget A costs $49, weighs 180 g and runs for 12 hours on a charge.
The aluminium body feels solid and the motor is nearly silent.</p></article>
<footer>© Widget Weekly</footer></body></html>"#;

    const WIDGET_B: &str = r#"<html><head><title>Widget B</title></head><body>
<nav>Shop / Widgets</nav>
<article><h1>Widget B review</h1>
<p>Widget B costs $39, weighs 210 g and runs for 9 hours on a charge.
Its plastic shell flexes a little but the app support is excellent.</p></article>
<footer>© Widget Weekly</footer></body></html>"#;

    fn scrape_config() -> ScrapeConfig {
        ScrapeConfig {
            routes: vec!["{raw_url}".into()],
            attempt_timeout: Duration::from_secs(2),
            allow_private_hosts: true,
            ..ScrapeConfig::default()
        }
    }

    async fn widget_server() -> MockServer {
        let server = MockServer::start().await;
        for (at, body) in [("/widget-a", WIDGET_A), ("/widget-b", WIDGET_B)] {
            Mock::given(method("GET"))
                .and(path(at))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn request(server: &MockServer, outline: &[&str]) -> CurationRequest {
        CurationRequest {
            topic: "Widget Comparison".into(),
            intro: "Shopping for a widget? Here's the short version.".into(),
            outline: outline.iter().map(|h| h.to_string()).collect(),
            urls: vec![
                format!("{}/widget-a", server.uri()),
                format!("{}/widget-b", server.uri()),
            ],
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<PipelineStatus>>>, impl Fn(PipelineStatus) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |s: PipelineStatus| sink.lock().unwrap().push(s))
    }

    fn curator(generator: Arc<ScriptedGenerator>) -> Curator {
        Curator::with_scrape_config(generator, &scrape_config(), StyleConfig::default()).unwrap()
    }

    const PLAN: &str = r#"```json
[
  {"sectionTitle": "Price", "contentDraft": "A is $49, B is $39.", "sourceIds": [1, 2]},
  {"sectionTitle": "Battery", "contentDraft": "A lasts 12 h, B lasts 9 h.", "sourceIds": [1, 2]}
]
```"#;

    #[test]
    fn tracker_refuses_skips_and_repeats() {
        let (seen, sink) = recorder();
        let mut tracker = StatusTracker::new(&sink);

        assert!(!tracker.advance(PipelineStatus::Analyzing));
        assert!(tracker.advance(PipelineStatus::Scraping));
        assert!(!tracker.advance(PipelineStatus::Scraping));
        assert!(!tracker.advance(PipelineStatus::Idle));
        assert_eq!(tracker.current(), PipelineStatus::Scraping);
        assert_eq!(*seen.lock().unwrap(), vec![PipelineStatus::Scraping]);
    }

    #[tokio::test]
    async fn widget_comparison_end_to_end() {
        let server = widget_server().await;
        let sources = [
            SourceRef {
                id: 1,
                url: format!("{}/widget-a", server.uri()),
                title: "Widget A".into(),
            },
            SourceRef {
                id: 2,
                url: format!("{}/widget-b", server.uri()),
                title: "Widget B".into(),
            },
        ];
        let line = citation_line(&[&sources[0], &sources[1]]);
        let article = format!(
            "```html\n<p>Shopping for a widget?</p>\n<h2>Price</h2><p>B is cheaper.</p><p>{line}</p>\n\
             <h2>Battery</h2><p>A lasts longer.</p><p>{line}</p>\n```"
        );
        let generator = Arc::new(ScriptedGenerator::new([PLAN.to_string(), article]));
        let (seen, sink) = recorder();

        let output = curator(generator.clone())
            .curate_detailed(&request(&server, &["Price", "Battery"]), &sink)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PipelineStatus::Scraping,
                PipelineStatus::Analyzing,
                PipelineStatus::Writing,
                PipelineStatus::Done
            ]
        );
        assert!(!output.html.contains("```"));
        assert_eq!(output.html.matches("<h2>").count(), 2);
        assert!(output.html.find("<h2>Price</h2>") < output.html.find("<h2>Battery</h2>"));
        assert!(output.html.contains(
            &format!(r#"(延伸閱讀：<a href="{}/widget-a" target="_blank">Widget A</a>)"#, server.uri())
        ));
        assert_eq!(output.sources, sources);
        assert_eq!(output.failed, 0);

        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].prompt.contains("Widget A costs $49"));
        assert!(!calls[0].prompt.contains("Widget Weekly"));
        assert!(calls[1].prompt.contains(&line));
    }

    #[tokio::test]
    async fn all_sources_failing_never_calls_generator() {
        let server = widget_server().await;
        let generator = Arc::new(ScriptedGenerator::new([PLAN]));
        let (seen, sink) = recorder();
        let req = CurationRequest {
            urls: vec![format!("{}/gone", server.uri()), format!("{}/also-gone", server.uri())],
            ..request(&server, &[])
        };

        let err = curator(generator.clone()).curate(&req, &sink).await.unwrap_err();

        assert!(matches!(err, LazyPackError::Scrape(_)));
        assert_eq!(generator.call_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![PipelineStatus::Scraping]);
    }

    #[tokio::test]
    async fn reordered_plan_aborts_before_editor() {
        let server = widget_server().await;
        let reordered = r#"[
  {"sectionTitle": "Battery", "contentDraft": "x", "sourceIds": [1]},
  {"sectionTitle": "Price", "contentDraft": "y", "sourceIds": [2]}
]"#;
        let generator = Arc::new(ScriptedGenerator::new([reordered, "<h2>never</h2>"]));
        let (seen, sink) = recorder();

        let err = curator(generator.clone())
            .curate(&request(&server, &["Price", "Battery"]), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LazyPackError::Architect(_)));
        assert_eq!(generator.call_count(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStatus::Scraping, PipelineStatus::Analyzing]
        );
    }

    #[tokio::test]
    async fn empty_outline_uses_default_sections() {
        let server = widget_server().await;
        let plan = serde_json::to_string(
            &architect::DEFAULT_OUTLINE
                .iter()
                .map(|h| serde_json::json!({"sectionTitle": h, "contentDraft": "n", "sourceIds": [1]}))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let generator = Arc::new(ScriptedGenerator::new([plan, "<h2>Overview</h2>".to_string()]));

        let html = curator(generator.clone())
            .curate(&request(&server, &[]), &SilentStatus)
            .await
            .unwrap();

        assert_eq!(html, "<h2>Overview</h2>");
        assert!(generator.calls()[0].prompt.contains("4. Conclusion"));
    }

    #[tokio::test]
    async fn editor_failure_withholds_done() {
        let server = widget_server().await;
        let generator = Arc::new(ScriptedGenerator::new([PLAN]).then_fail("quota exceeded"));
        let (seen, sink) = recorder();

        let err = curator(generator)
            .curate(&request(&server, &["Price", "Battery"]), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LazyPackError::Editor(_)));
        assert_eq!(seen.lock().unwrap().last(), Some(&PipelineStatus::Writing));
    }
}
