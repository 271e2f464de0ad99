//! Internal link analysis: weave links to a site's own pages into an article.

use std::collections::HashSet;

use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use lazypack_shared::{AnalysisResult, LazyPackError, Result};

use crate::generation::{GenerationRequest, Generator};
use crate::postprocess::strip_code_fences;

/// Candidate URLs sent with one request.
pub const MAX_CANDIDATE_URLS: usize = 500;

const SYSTEM_INSTRUCTION: &str = r#"You are an SEO editor specialising in internal linking.

Given an article and a list of URLs from the same site:
1. Pick the URLs whose pages are most relevant to specific passages of the
   article. Prefer a few strong links over many weak ones. Link each URL at
   most once.
2. Rewrite only the sentences that receive a link so the anchor text reads
   naturally. Keep the rest of the article, including its headings, unchanged.
3. Insert links with Markdown syntax: [anchor text](url).
4. Only use URLs from the provided list.
5. For every inserted link, report the original sentence, the revised sentence,
   the anchor text, the target URL and a short reason written in Traditional
   Chinese (繁體中文).

Return the full revised article and the list of suggestions as JSON."#;

/// JSON schema for the analysis reply.
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "revisedArticle": {
                "type": "string",
                "description": "The full article with the new internal links inserted as [anchor](url)."
            },
            "suggestions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "originalSegment": { "type": "string" },
                        "revisedSegment": { "type": "string" },
                        "anchorText": { "type": "string" },
                        "targetUrl": { "type": "string" },
                        "reason": { "type": "string" }
                    },
                    "required": ["anchorText", "targetUrl", "reason", "revisedSegment"]
                }
            }
        },
        "required": ["revisedArticle", "suggestions"]
    })
}

/// Propose internal links for `article` drawn from `urls`.
///
/// Only the first [`MAX_CANDIDATE_URLS`] candidates are offered. Suggestions
/// pointing anywhere else are dropped.
#[instrument(skip_all, fields(article_chars = article.chars().count(), candidates = urls.len()))]
pub async fn analyze_article(
    generator: &dyn Generator,
    article: &str,
    urls: &[String],
) -> Result<AnalysisResult> {
    if article.trim().is_empty() {
        return Err(LazyPackError::validation("article is empty"));
    }
    if urls.is_empty() {
        return Err(LazyPackError::validation("no candidate URLs to link to"));
    }

    let candidates = &urls[..urls.len().min(MAX_CANDIDATE_URLS)];
    if candidates.len() < urls.len() {
        warn!(
            offered = candidates.len(),
            dropped = urls.len() - candidates.len(),
            "candidate list truncated"
        );
    }

    let request = GenerationRequest {
        prompt: format!(
            "Article:\n{article}\n\n---\nCandidate URLs (pick the best matches):\n{}",
            candidates.join("\n")
        ),
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        schema: Some(analysis_schema()),
    };

    let text = generator.generate(&request).await?;
    let cleaned = strip_code_fences(&text);
    if cleaned.is_empty() {
        return Err(LazyPackError::Generation("generator returned no text".into()));
    }

    let mut result: AnalysisResult = serde_json::from_str(&cleaned)
        .map_err(|e| LazyPackError::parse(format!("analysis reply does not match the schema: {e}")))?;

    let allowed: HashSet<&str> = candidates.iter().map(String::as_str).collect();
    let before = result.suggestions.len();
    result.suggestions.retain(|s| {
        let keep = allowed.contains(s.target_url.trim());
        if !keep {
            warn!(target_url = %s.target_url, "dropping suggestion outside the candidate list");
        }
        keep
    });

    info!(
        suggestions = result.suggestions.len(),
        dropped = before - result.suggestions.len(),
        "link analysis completed"
    );

    Ok(result)
}
