//! Core domain types for the curation pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when a page was fetched but carries no usable title.
pub const UNTITLED_TITLE: &str = "Untitled Article";

/// Title used when every retrieval route failed for a source.
pub const LOAD_FAILED_TITLE: &str = "Load Failed";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ScrapedContent
// ---------------------------------------------------------------------------

/// One fetched-and-cleaned source document.
///
/// Built once per URL by the scrape coordinator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedContent {
    /// 1-based id fixed by the position of the URL in the input list.
    pub id: u32,
    /// Origin URL.
    pub url: String,
    /// Extracted title, or a sentinel title.
    pub title: String,
    /// Cleaned plain-text body, truncated to the content budget.
    pub content: String,
}

impl ScrapedContent {
    /// Sentinel for a source whose retrieval routes were all exhausted.
    pub fn load_failed(id: u32, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: LOAD_FAILED_TITLE.to_string(),
            content: String::new(),
        }
    }

    /// Whether this is the load-failure sentinel.
    pub fn is_load_failure(&self) -> bool {
        self.content.is_empty() && self.title == LOAD_FAILED_TITLE
    }

    /// Whether the content is long enough to be worth sending downstream.
    pub fn is_usable(&self, min_content_chars: usize) -> bool {
        self.content.chars().count() > min_content_chars
    }

    /// Citation metadata for this source.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            id: self.id,
            url: self.url.clone(),
            title: self.title.clone(),
        }
    }
}

/// Citation metadata handed to the editor stage (`id → {url, title}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: u32,
    pub url: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// ArchitectDraft
// ---------------------------------------------------------------------------

/// One section's structured content plan, as returned by the architect stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectDraft {
    /// Must equal the matching outline heading verbatim.
    pub section_title: String,
    /// Notes to be expanded into prose; may carry the no-source marker.
    pub content_draft: String,
    /// Ids of the `ScrapedContent` entries this section draws on.
    pub source_ids: Vec<u32>,
}

// ---------------------------------------------------------------------------
// CurationRequest
// ---------------------------------------------------------------------------

/// Input contract of the curation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurationRequest {
    /// Article topic.
    pub topic: String,
    /// Tone-setting intro written by the user.
    pub intro: String,
    /// Section headings, order-significant. Empty means "use the default outline".
    #[serde(default)]
    pub outline: Vec<String>,
    /// Source URLs, order-significant.
    pub urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// Pipeline progress. Ordering follows the only legal transition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Idle,
    Scraping,
    Analyzing,
    Writing,
    Done,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scraping => "scraping",
            Self::Analyzing => "analyzing",
            Self::Writing => "writing",
            Self::Done => "done",
        }
    }

    /// The status that legally follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Scraping),
            Self::Scraping => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Writing),
            Self::Writing => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Internal link analysis
// ---------------------------------------------------------------------------

/// One internal-link insertion proposed for an existing article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSuggestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_segment: Option<String>,
    pub revised_segment: String,
    pub anchor_text: String,
    pub target_url: String,
    pub reason: String,
}

/// Revised article plus the links that were inserted into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub revised_article: String,
    pub suggestions: Vec<LinkSuggestion>,
}
