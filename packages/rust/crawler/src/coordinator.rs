//! Scrape coordinator: concurrent fan-out over the source URLs.

use tracing::{info, instrument, warn};

use lazypack_shared::{LazyPackError, Result, ScrapeConfig, ScrapedContent};

use crate::fetcher::SourceFetcher;

/// Outcome of one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    /// Usable sources, ordered by id.
    pub sources: Vec<ScrapedContent>,
    /// URLs actually attempted (after the source cap).
    pub attempted: usize,
    /// Attempted URLs that produced no usable content.
    pub failed: usize,
}

/// Fans out one fetch task per URL and joins all of them.
#[derive(Debug, Clone)]
pub struct ScrapeCoordinator {
    fetcher: SourceFetcher,
    max_sources: usize,
    min_content_chars: usize,
}

impl ScrapeCoordinator {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self::with_fetcher(SourceFetcher::new(config)?, config))
    }

    /// Use an existing fetcher; limits still come from `config`.
    pub fn with_fetcher(fetcher: SourceFetcher, config: &ScrapeConfig) -> Self {
        Self {
            fetcher,
            max_sources: config.max_sources,
            min_content_chars: config.min_content_chars,
        }
    }

    /// Scrape up to `max_sources` URLs concurrently.
    ///
    /// Ids are assigned `1..=n` in input order before any task starts, so the
    /// result order never depends on completion order. Every task is awaited;
    /// a failing or panicking task only costs its own source.
    #[instrument(skip_all, fields(requested = urls.len()))]
    pub async fn scrape(&self, urls: &[String]) -> Result<ScrapeReport> {
        if urls.len() > self.max_sources {
            warn!(
                requested = urls.len(),
                max = self.max_sources,
                "source list capped"
            );
        }

        let batch: Vec<(u32, String)> = urls
            .iter()
            .take(self.max_sources)
            .zip(1u32..)
            .map(|(url, id)| (id, url.trim().to_string()))
            .collect();
        let attempted = batch.len();

        info!(attempted, "starting scrape");

        let mut handles = Vec::with_capacity(attempted);
        for (id, url) in batch {
            let fetcher = self.fetcher.clone();
            handles.push((
                id,
                tokio::spawn(async move { fetcher.fetch(&url, id).await }),
            ));
        }

        let mut sources = Vec::with_capacity(attempted);
        for (id, handle) in handles {
            match handle.await {
                Ok(content) if content.is_usable(self.min_content_chars) => sources.push(content),
                Ok(content) => {
                    warn!(
                        id,
                        url = %content.url,
                        title = %content.title,
                        "source discarded: no usable content"
                    );
                }
                Err(e) => warn!(id, error = %e, "fetch task failed"),
            }
        }

        let failed = attempted - sources.len();
        info!(usable = sources.len(), failed, "scrape completed");

        if sources.is_empty() {
            return Err(LazyPackError::Scrape(format!(
                "none of the {attempted} source(s) yielded usable content"
            )));
        }

        Ok(ScrapeReport {
            sources,
            attempted,
            failed,
        })
    }
}
