//! Editor stage: write the final HTML article from the content plan.

use std::collections::{HashMap, HashSet};

use tracing::{info, instrument};

use lazypack_shared::{ArchitectDraft, LazyPackError, Result, SourceRef, StyleConfig};

use crate::architect::NO_SOURCE_MARKER;
use crate::generation::{GenerationRequest, Generator};
use crate::postprocess::strip_code_fences;

/// Citation markup; `{url}` and `{title}` are substituted per source.
pub const CITATION_TEMPLATE: &str = r#"(延伸閱讀：<a href="{url}" target="_blank">{title}</a>)"#;

/// Render one citation.
pub fn citation(source: &SourceRef) -> String {
    CITATION_TEMPLATE
        .replace("{url}", &escape_attr(&source.url))
        .replace("{title}", &escape_text(&source.title))
}

/// Render every citation for a section on one line, separated by a space.
pub fn citation_line(sources: &[&SourceRef]) -> String {
    sources
        .iter()
        .map(|s| citation(s))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

fn system_instruction(style: &StyleConfig) -> String {
    let mut rules = vec![
        format!("Write in {}.", style.language),
        format!("Target length per section: {}.", style.section_length),
        format!("Headings: {}.", style.heading_style),
    ];
    if !style.terminology.is_empty() {
        rules.push(format!(
            "Terminology and punctuation: {}.",
            style.terminology.join("; ")
        ));
    }
    if !style.banned_phrases.is_empty() {
        rules.push(format!(
            "Never use these phrases: {}.",
            style.banned_phrases.join(", ")
        ));
    }
    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a senior content curator writing a "lazy pack" summary article.

Tone: study the user's intro and match its voice. Open the article with a
polished version of that intro in a <p>.

Structure contract:
- Write exactly one <h2> per section, in the order given, using the section
  title verbatim as the heading text.
- Expand each section's notes into prose with <p>, <ul>, <li> and <strong>.
  Use only the facts in the notes.
- Directly after each section's prose, copy its citation line exactly as given,
  in its own <p>. If a section has no citation line, write none.
- If a section's notes are {NO_SOURCE_MARKER}, write one short sentence saying
  the sources do not cover it.
- Return a raw HTML fragment only. No <html>, <head> or <body> tags, no
  Markdown, no code fences.

Style rules:
{rules}"#
    )
}

fn build_prompt(
    topic: &str,
    intro: &str,
    drafts: &[ArchitectDraft],
    sources: &HashMap<u32, &SourceRef>,
) -> String {
    let mut prompt = format!("Topic: {topic}\n\nUser intro (sets the tone):\n{intro}\n");

    for (index, draft) in drafts.iter().enumerate() {
        let mut seen = HashSet::new();
        let cited: Vec<&SourceRef> = draft
            .source_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| sources.get(id).copied())
            .collect();
        let line = if cited.is_empty() {
            "(none)".to_string()
        } else {
            citation_line(&cited)
        };

        prompt.push_str(&format!(
            "\nSection {n}: {title}\nNotes:\n{notes}\nCitation line:\n{line}\n",
            n = index + 1,
            title = draft.section_title,
            notes = draft.content_draft,
        ));
    }

    prompt
}

/// Run the editor stage and return the article as an HTML fragment.
#[instrument(skip_all, fields(topic = %topic, sections = drafts.len()))]
pub async fn run_editor(
    generator: &dyn Generator,
    topic: &str,
    intro: &str,
    drafts: &[ArchitectDraft],
    sources: &[SourceRef],
    style: &StyleConfig,
) -> Result<String> {
    let by_id: HashMap<u32, &SourceRef> = sources.iter().map(|s| (s.id, s)).collect();

    let request = GenerationRequest {
        prompt: build_prompt(topic, intro, drafts, &by_id),
        system_instruction: system_instruction(style),
        schema: None,
    };

    let text = generator
        .generate(&request)
        .await
        .map_err(|e| LazyPackError::Editor(e.to_string()))?;

    let html = strip_code_fences(&text);
    if html.is_empty() {
        return Err(LazyPackError::Editor("generator returned no text".into()));
    }

    info!(chars = html.chars().count(), "article written");
    Ok(html)
}
