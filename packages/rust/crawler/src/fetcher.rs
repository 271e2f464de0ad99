//! Source fetcher: retrieve one URL through an ordered chain of retrieval routes.
//!
//! A route is a URL template. The direct route is `{raw_url}`; CORS-style
//! proxies embed the percent-encoded source as `{url}`. Routes are tried in
//! order until one answers 2xx with a body long enough to be a real page
//! (proxies like to answer 200 with an empty stand-in). Every attempt is
//! bounded by its own timeout.
//!
//! [`SourceFetcher::fetch`] never fails: when every route is exhausted it
//! returns a [`ScrapedContent::load_failed`] sentinel so the coordinator can
//! tally partial results.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use lazypack_shared::{LazyPackError, Result, ScrapeConfig, ScrapedContent};

use crate::clean;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("LazyPack/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per attempt.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// SourceFetcher
// ---------------------------------------------------------------------------

/// Fetches and cleans single source pages. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
    routes: Vec<String>,
    attempt_timeout: Duration,
    min_body_len: usize,
    content_budget: usize,
    allow_private_hosts: bool,
}

impl SourceFetcher {
    /// Create a fetcher from the runtime scrape configuration.
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| LazyPackError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            routes: config.routes.clone(),
            attempt_timeout: config.attempt_timeout,
            min_body_len: config.min_body_len,
            content_budget: config.content_budget,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Fetch, clean, and package one source. Failure is returned as a sentinel.
    #[instrument(skip_all, fields(%url, id = id))]
    pub async fn fetch(&self, url: &str, id: u32) -> ScrapedContent {
        match self.fetch_raw(url).await {
            Ok(body) => {
                let page = clean::clean_document(&body, self.content_budget);
                debug!(
                    title = %page.title,
                    chars = page.text.chars().count(),
                    "source cleaned"
                );
                ScrapedContent {
                    id,
                    url: url.to_string(),
                    title: page.title,
                    content: page.text,
                }
            }
            Err(e) => {
                warn!(error = %e, "all retrieval routes failed");
                ScrapedContent::load_failed(id, url)
            }
        }
    }

    /// Retrieve the raw body of `url` through the route chain.
    ///
    /// Returns the last route's failure when every route is exhausted.
    pub async fn fetch_raw(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| LazyPackError::fetch(url, format!("invalid URL: {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&parsed) {
            return Err(LazyPackError::fetch(
                url,
                "refused: non-http scheme or private host",
            ));
        }

        let mut last_error = None;

        for (index, template) in self.routes.iter().enumerate() {
            let target = route_url(template, parsed.as_str());

            match tokio::time::timeout(self.attempt_timeout, self.try_route(&target, url)).await {
                Ok(Ok(body)) => {
                    debug!(route = index, bytes = body.len(), "route succeeded");
                    return Ok(body);
                }
                Ok(Err(e)) => {
                    debug!(route = index, error = %e, "route failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!(route = index, "route timed out");
                    last_error = Some(LazyPackError::fetch(
                        url,
                        format!("route {index} timed out after {:?}", self.attempt_timeout),
                    ));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LazyPackError::fetch(url, "no retrieval routes configured")))
    }

    /// One attempt against one route.
    async fn try_route(&self, target: &str, source: &str) -> Result<String> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| LazyPackError::fetch(source, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LazyPackError::fetch(source, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LazyPackError::fetch(source, format!("body read failed: {e}")))?;

        if body.trim().len() <= self.min_body_len {
            return Err(LazyPackError::fetch(
                source,
                format!("implausibly short body ({} bytes)", body.trim().len()),
            ));
        }

        Ok(body)
    }
}

/// Expand a route template for `source`.
pub fn route_url(template: &str, source: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(source.as_bytes()).collect();
    template
        .replace("{raw_url}", source)
        .replace("{url}", &encoded)
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture_page(title: &str) -> String {
        format!(
            "<html><head><title>{title}</title></head><body><nav>Menu</nav>\
             <article><p>{title} is a compact widget with a long battery life, \
             a sturdy aluminium shell and a two year warranty from the maker.</p>\
             <p>Reviewers praise the price and the quiet motor.</p></article>\
             <footer>Footer text</footer></body></html>"
        )
    }

    fn test_config(routes: Vec<String>) -> ScrapeConfig {
        ScrapeConfig {
            routes,
            attempt_timeout: Duration::from_millis(500),
            allow_private_hosts: true,
            ..ScrapeConfig::default()
        }
    }

    #[test]
    fn route_url_encodes_placeholder() {
        let src = "https://example.com/a b?x=1&y=2";
        assert_eq!(
            route_url("https://corsproxy.io/?{url}", src),
            "https://corsproxy.io/?https%3A%2F%2Fexample.com%2Fa+b%3Fx%3D1%26y%3D2"
        );
        assert_eq!(route_url("{raw_url}", src), src);
    }

    #[test]
    fn ssrf_blocks_private_and_non_http() {
        for blocked in [
            "file:///etc/passwd",
            "http://127.0.0.1:8080/",
            "http://10.0.0.1/",
            "http://localhost:3000/api",
            "http://[::1]/",
        ] {
            let url = Url::parse(blocked).unwrap();
            assert!(is_ssrf_target(&url), "{blocked} should be blocked");
        }
        let url = Url::parse("https://docs.example.com/page").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[tokio::test]
    async fn direct_route_fetches_and_cleans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget-a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture_page("Widget A")))
            .mount(&server)
            .await;

        let fetcher = SourceFetcher::new(&test_config(vec!["{raw_url}".into()])).unwrap();
        let page = fetcher
            .fetch(&format!("{}/widget-a", server.uri()), 1)
            .await;

        assert_eq!(page.id, 1);
        assert_eq!(page.title, "Widget A");
        assert!(page.content.starts_with("Widget A is a compact widget"));
        assert!(!page.content.contains("Menu"));
        assert!(!page.content.contains("Footer text"));
    }

    #[tokio::test]
    async fn falls_back_to_next_route_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture_page("Widget B")))
            .expect(1)
            .mount(&server)
            .await;

        let routes = vec![format!("{}/proxy?u={{url}}", server.uri()), "{raw_url}".into()];
        let fetcher = SourceFetcher::new(&test_config(routes)).unwrap();
        let page = fetcher.fetch(&format!("{}/page", server.uri()), 2).await;

        assert_eq!(page.title, "Widget B");
        assert!(!page.is_load_failure());
    }

    #[tokio::test]
    async fn short_body_counts_as_route_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stub"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/real"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture_page("Real Page")))
            .mount(&server)
            .await;

        let routes = vec![format!("{}/stub?u={{url}}", server.uri()), format!("{}/real?u={{url}}", server.uri())];
        let fetcher = SourceFetcher::new(&test_config(routes)).unwrap();
        let page = fetcher.fetch("https://news.example.com/story", 3).await;

        assert_eq!(page.title, "Real Page");
        assert_eq!(page.url, "https://news.example.com/story");
    }

    #[tokio::test]
    async fn slow_route_is_abandoned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(fixture_page("Too Late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture_page("On Time")))
            .mount(&server)
            .await;

        let routes = vec![format!("{}/slow?u={{url}}", server.uri()), format!("{}/fast?u={{url}}", server.uri())];
        let mut config = test_config(routes);
        config.attempt_timeout = Duration::from_millis(200);
        let fetcher = SourceFetcher::new(&config).unwrap();
        let page = fetcher.fetch("https://news.example.com/story", 1).await;

        assert_eq!(page.title, "On Time");
    }

    #[tokio::test]
    async fn exhausted_routes_yield_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let routes = vec!["{raw_url}".into(), format!("{}/proxy?u={{url}}", server.uri())];
        let fetcher = SourceFetcher::new(&test_config(routes)).unwrap();
        let url = format!("{}/missing", server.uri());
        let page = fetcher.fetch(&url, 4).await;

        assert!(page.is_load_failure());
        assert_eq!(page.id, 4);
        assert_eq!(page.url, url);
        assert!(page.content.is_empty());

        let err = fetcher.fetch_raw(&url).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn private_host_refused_without_opt_in() {
        let config = ScrapeConfig {
            routes: vec!["{raw_url}".into()],
            ..ScrapeConfig::default()
        };
        let fetcher = SourceFetcher::new(&config).unwrap();
        let page = fetcher.fetch("http://127.0.0.1:9/admin", 1).await;
        assert!(page.is_load_failure());
    }

    /// Collects `name=value` pairs from every span opened under it.
    #[derive(Clone, Default)]
    struct SpanFields(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    struct FieldText<'a>(&'a mut Vec<String>);

    impl tracing::field::Visit for FieldText<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push(format!("{}={value:?}", field.name()));
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut fields = self.0.lock().unwrap();
            attrs.record(&mut FieldText(&mut fields));
        }
    }

    #[tokio::test]
    async fn fetch_span_records_source_id() {
        use tracing_subscriber::layer::SubscriberExt;

        let fields = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(fields.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let fetcher = SourceFetcher::new(&ScrapeConfig::default()).unwrap();
        fetcher.fetch("http://127.0.0.1:9/admin", 7).await;

        let fields = fields.0.lock().unwrap();
        assert!(fields.iter().any(|f| f == "id=7"), "fields: {fields:?}");
        assert!(fields.iter().any(|f| f.starts_with("url=")), "fields: {fields:?}");
    }
}
