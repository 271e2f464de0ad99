//! Error types for LazyPack.
//!
//! Library crates use [`LazyPackError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LazyPack operations.
#[derive(Debug, thiserror::Error)]
pub enum LazyPackError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of source fetching.
    #[error("network error: {0}")]
    Network(String),

    /// Markup or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Input validation error (empty article, malformed URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Generation backend error (transport, HTTP status, malformed envelope).
    #[error("generation error: {0}")]
    Generation(String),

    /// A single retrieval route failed for one source URL.
    ///
    /// Absorbed by the fetcher; never propagated past it.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// No source yielded usable content.
    #[error("scrape failed: {0}")]
    Scrape(String),

    /// The architect stage errored or returned a non-conforming plan.
    #[error("architect stage failed: {0}")]
    Architect(String),

    /// The editor stage errored or returned no text.
    #[error("editor stage failed: {0}")]
    Editor(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LazyPackError>;

impl LazyPackError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a per-route fetch failure.
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a curation run.
    pub fn is_stage_failure(&self) -> bool {
        matches!(self, Self::Scrape(_) | Self::Architect(_) | Self::Editor(_))
    }
}
