//! Architect stage: turn scraped sources into a per-section content plan.
//!
//! One schema-constrained generation call maps the outline onto the sources.
//! The reply is parsed and then checked against two invariants before it is
//! allowed downstream: the section titles reproduce the outline exactly, and
//! every cited source id belongs to a source that survived scraping.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};

use lazypack_shared::{ArchitectDraft, LazyPackError, Result, ScrapedContent};

use crate::generation::{GenerationRequest, Generator};
use crate::postprocess::strip_code_fences;

/// Outline used when the request leaves it empty.
pub const DEFAULT_OUTLINE: [&str; 4] = ["Overview", "Key Highlights", "Practical Tips", "Conclusion"];

/// Marker a draft carries when no source supports its section.
pub const NO_SOURCE_MARKER: &str = "[NO_SOURCE_DATA]";

const SYSTEM_INSTRUCTION: &str = r#"You are a meticulous research architect. You read raw source documents and
plan an article section by section.

Strict rules:
1. Produce exactly one entry per outline heading, in the outline's order. Copy
   each heading verbatim into "sectionTitle". Never add, merge, rename or skip
   a section.
2. "contentDraft" holds dense notes for that section: facts, figures, quotes.
   Use only facts present in the sources. Do not add outside knowledge.
3. "sourceIds" lists the ids of the sources the notes come from. Only use ids
   that appear in the source data.
4. If no source supports a section, set "contentDraft" to "[NO_SOURCE_DATA]"
   and "sourceIds" to an empty array.

Return only a JSON object whose "sections" property holds the entries."#;

/// Use `outline` if it has any headings, else [`DEFAULT_OUTLINE`].
pub fn effective_outline(outline: &[String]) -> Vec<String> {
    let headings: Vec<String> = outline
        .iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();

    if headings.is_empty() {
        DEFAULT_OUTLINE.iter().map(|h| h.to_string()).collect()
    } else {
        headings
    }
}

/// JSON schema for the architect's reply.
///
/// The section array sits under a `sections` property because strict
/// OpenAI-compatible endpoints only accept an object at the schema root.
pub fn architect_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sectionTitle": {
                            "type": "string",
                            "description": "The outline heading, copied verbatim."
                        },
                        "contentDraft": {
                            "type": "string",
                            "description": "Notes for this section, or [NO_SOURCE_DATA]."
                        },
                        "sourceIds": {
                            "type": "array",
                            "items": { "type": "integer" },
                            "description": "Ids of the sources these notes come from."
                        }
                    },
                    "required": ["sectionTitle", "contentDraft", "sourceIds"]
                }
            }
        },
        "required": ["sections"]
    })
}

/// The plan as sent back: wrapped per [`architect_schema`], or a bare array
/// from backends that ignore the wrapper.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanReply {
    Wrapped { sections: Vec<ArchitectDraft> },
    Bare(Vec<ArchitectDraft>),
}

#[derive(Serialize)]
struct SourcePayload<'a> {
    id: u32,
    title: &'a str,
    content: &'a str,
}

fn build_prompt(topic: &str, outline: &[String], sources: &[&ScrapedContent]) -> Result<String> {
    let payload: Vec<SourcePayload<'_>> = sources
        .iter()
        .map(|s| SourcePayload {
            id: s.id,
            title: &s.title,
            content: &s.content,
        })
        .collect();
    let data = serde_json::to_string(&payload)
        .map_err(|e| LazyPackError::Architect(format!("encoding source data: {e}")))?;

    let headings = outline
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {h}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "Topic: {topic}\n\nOutline ({} sections):\n{headings}\n\nSource data:\n{data}",
        outline.len()
    ))
}

/// Run the architect stage.
///
/// Sources at or below `min_content_chars` are left out of the prompt and may
/// not be cited.
#[instrument(skip_all, fields(topic = %topic, sections = outline.len(), sources = sources.len()))]
pub async fn run_architect(
    generator: &dyn Generator,
    topic: &str,
    outline: &[String],
    sources: &[ScrapedContent],
    min_content_chars: usize,
) -> Result<Vec<ArchitectDraft>> {
    let usable: Vec<&ScrapedContent> = sources
        .iter()
        .filter(|s| s.is_usable(min_content_chars))
        .collect();

    let request = GenerationRequest {
        prompt: build_prompt(topic, outline, &usable)?,
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        schema: Some(architect_schema()),
    };

    let text = generator
        .generate(&request)
        .await
        .map_err(|e| LazyPackError::Architect(e.to_string()))?;

    let drafts = parse_drafts(&text)?;
    validate_outline(&drafts, outline)?;
    let valid_ids: Vec<u32> = usable.iter().map(|s| s.id).collect();
    validate_source_refs(&drafts, &valid_ids)?;

    let unsupported = drafts
        .iter()
        .filter(|d| d.content_draft.contains(NO_SOURCE_MARKER))
        .count();
    info!(sections = drafts.len(), unsupported, "content plan accepted");

    Ok(drafts)
}

/// Parse the architect reply into drafts.
pub fn parse_drafts(text: &str) -> Result<Vec<ArchitectDraft>> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(LazyPackError::Architect("generator returned no text".into()));
    }
    let reply: PlanReply = serde_json::from_str(&cleaned)
        .map_err(|e| LazyPackError::Architect(format!("reply does not match the plan schema: {e}")))?;
    Ok(match reply {
        PlanReply::Wrapped { sections } | PlanReply::Bare(sections) => sections,
    })
}

/// The draft titles must reproduce `outline` exactly, in order. Padding counts
/// as a mismatch, since the title is used verbatim as the article heading.
pub fn validate_outline(drafts: &[ArchitectDraft], outline: &[String]) -> Result<()> {
    if drafts.len() != outline.len() {
        return Err(LazyPackError::Architect(format!(
            "expected {} sections, got {}",
            outline.len(),
            drafts.len()
        )));
    }

    for (index, (draft, heading)) in drafts.iter().zip(outline).enumerate() {
        if draft.section_title != *heading {
            return Err(LazyPackError::Architect(format!(
                "section {} is {:?}, expected {:?}",
                index + 1,
                draft.section_title,
                heading
            )));
        }
    }

    Ok(())
}

/// Every cited id must be one of `valid_ids`.
pub fn validate_source_refs(drafts: &[ArchitectDraft], valid_ids: &[u32]) -> Result<()> {
    let valid: HashSet<u32> = valid_ids.iter().copied().collect();

    for draft in drafts {
        if let Some(bad) = draft.source_ids.iter().find(|id| !valid.contains(*id)) {
            return Err(LazyPackError::Architect(format!(
                "section {:?} cites unknown source id {bad}",
                draft.section_title
            )));
        }
    }

    Ok(())
}
