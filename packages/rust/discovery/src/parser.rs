//! Format-specific URL parsers: XML sitemaps, HTML link pages, and plain lists.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `<loc>…</loc>`, tolerating CDATA. Namespaced `<image:loc>` is not a page.
static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</loc>").expect("loc regex")
});

static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Whether the text looks like an XML sitemap (or sitemap index).
pub(crate) fn looks_like_sitemap(text: &str) -> bool {
    LOC_RE.is_match(text)
}

/// Whether the text looks like an HTML page rather than a plain list.
pub(crate) fn looks_like_html(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("<a ") || lower.contains("<html") || lower.contains("<body")
}

/// Extract every `<loc>` value from an XML sitemap.
pub(crate) fn parse_sitemap_locs(text: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(text)
        .map(|caps| unescape_xml(caps[1].trim()))
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Extract anchor targets from an HTML page.
///
/// Relative links are resolved against `base`; with a base, only same-origin
/// links are kept. Without a base, only absolute http(s) links survive.
pub(crate) fn parse_html_links(text: &str, base: Option<&Url>) -> Vec<String> {
    let doc = Html::parse_document(text);
    let mut links = Vec::new();

    for el in doc.select(&ANCHOR_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let resolved = match base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        let Ok(mut resolved) = resolved else {
            continue;
        };
        if !is_http(&resolved) {
            continue;
        }
        if let Some(base) = base {
            if resolved.origin() != base.origin() {
                continue;
            }
        }

        resolved.set_fragment(None);
        links.push(resolved.to_string());
    }

    links
}

/// Treat each line as a URL candidate; keep absolute http(s) URLs only.
pub(crate) fn parse_plain_lines(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.split([',', ' ', '\t']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| Url::parse(s).ok())
        .filter(is_http)
        .map(|u| u.to_string())
        .collect()
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Decode the five predefined XML entities.
fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
