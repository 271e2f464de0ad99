//! Curation pipeline and generation stages for LazyPack.
//!
//! This crate ties the scraper to the generation backend: the architect plans
//! the article from scraped sources, the editor writes it, and [`pipeline`]
//! runs the stages in order while reporting status.

pub mod architect;
pub mod editor;
pub mod generation;
pub mod linker;
pub mod pipeline;
pub mod postprocess;

#[cfg(test)]
mod test_support;

pub use generation::{
    GenerationRequest, Generator, OpenRouterGenerator, ProxyGenerator, build_generator,
};
pub use linker::analyze_article;
pub use pipeline::{CurationOutput, Curator, SilentStatus, StatusReporter, StatusTracker};
