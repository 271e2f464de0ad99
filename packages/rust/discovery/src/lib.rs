//! Sitemap and link-list URL extraction.
//!
//! Editors paste either a `sitemap.xml`, the HTML of a page full of links, or a
//! plain list of URLs. [`extract_urls`] accepts any of the three and returns a
//! deduplicated list of absolute URLs in first-seen order.

mod parser;

use std::collections::HashSet;

use tracing::{debug, instrument};
use url::Url;

/// Which input format [`extract_urls`] recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSourceKind {
    /// XML sitemap with `<loc>` entries.
    Sitemap,
    /// HTML page; anchors were harvested.
    HtmlPage,
    /// Free text, one or more URLs per line.
    PlainList,
}

/// URLs extracted from pasted or downloaded text.
#[derive(Debug, Clone)]
pub struct ExtractedUrls {
    pub kind: UrlSourceKind,
    pub urls: Vec<String>,
}

/// Extract absolute URLs from sitemap XML, HTML, or a plain list.
///
/// `base` resolves relative HTML links and restricts them to the base origin;
/// it is ignored for sitemaps and plain lists.
#[instrument(skip_all, fields(len = text.len()))]
pub fn extract_urls(text: &str, base: Option<&Url>) -> ExtractedUrls {
    let (kind, raw) = if parser::looks_like_sitemap(text) {
        (UrlSourceKind::Sitemap, parser::parse_sitemap_locs(text))
    } else if parser::looks_like_html(text) {
        (UrlSourceKind::HtmlPage, parser::parse_html_links(text, base))
    } else {
        (UrlSourceKind::PlainList, parser::parse_plain_lines(text))
    };

    let urls = dedup_preserving_order(raw);
    debug!(?kind, count = urls.len(), "urls extracted");

    ExtractedUrls { kind, urls }
}

/// Drop repeated entries, keeping the first occurrence.
fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
