//! Reduce a fetched HTML document to its title and readable body text.
//!
//! Page chrome (navigation, headers/footers, sidebars), scripts, embedded
//! frames, vector graphics, forms and ad containers are dropped before the text
//! is collected. Whitespace is collapsed and the result is cut to the content
//! budget on a character boundary.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use lazypack_shared::UNTITLED_TITLE;

/// Elements whose whole subtree carries no article content.
static NOISE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(concat!(
        "script, style, noscript, template, nav, footer, header, aside, iframe, svg, ",
        "form, button, input, select, textarea, ",
        ".ad, .ads, .adsbygoogle, .ad-container, .advertisement, ",
        r#"[id^="ad-"], [class*="advert"], [id*="advert"], [class*="sponsor"]"#
    ))
    .expect("noise selector")
});

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector"));

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1 selector"));

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Title and text extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPage {
    pub title: String,
    pub text: String,
}

/// Parse `html`, strip non-content elements, and return title + body text.
pub fn clean_document(html: &str, content_budget: usize) -> CleanedPage {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let text = collapse_whitespace(&body_text(&doc));

    CleanedPage {
        title,
        text: truncate_chars(&text, content_budget),
    }
}

/// `<title>`, else the first `<h1>`, else the untitled sentinel.
fn extract_title(doc: &Html) -> String {
    [&*TITLE_SEL, &*H1_SEL]
        .into_iter()
        .filter_map(|sel| doc.select(sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_TITLE.to_string())
}

/// Concatenate every text node of `<body>` outside the noise subtrees.
fn body_text(doc: &Html) -> String {
    let excluded: HashSet<_> = doc.select(&NOISE_SEL).map(|el| el.id()).collect();
    let root: ElementRef<'_> = doc
        .select(&BODY_SEL)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut out = String::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        if node.ancestors().any(|a| excluded.contains(&a.id())) {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    out
}

/// Replace every whitespace run with one space and trim the ends.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Keep at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
