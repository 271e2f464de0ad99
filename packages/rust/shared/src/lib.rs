//! Shared types, error model, and configuration for LazyPack.
//!
//! This crate is the foundation depended on by all other LazyPack crates.
//! It provides:
//! - [`LazyPackError`]: the unified error type
//! - Domain types ([`ScrapedContent`], [`ArchitectDraft`], [`CurationRequest`], [`PipelineStatus`])
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendKind, GenerationConfig, ScrapeConfig, ScrapeSettings, StyleConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key, validate_config,
};
pub use error::{LazyPackError, Result};
pub use types::{
    AnalysisResult, ArchitectDraft, CurationRequest, LOAD_FAILED_TITLE, LinkSuggestion,
    PipelineStatus, RunId, ScrapedContent, SourceRef, UNTITLED_TITLE,
};
