//! Source retrieval for the curation pipeline.
//!
//! This crate provides:
//! - [`fetcher`]: one URL through an ordered chain of retrieval routes
//! - [`clean`]: HTML to title + readable text
//! - [`coordinator`]: concurrent fan-out over a capped URL list

pub mod clean;
pub mod coordinator;
pub mod fetcher;

pub use clean::{CleanedPage, clean_document};
pub use coordinator::{ScrapeCoordinator, ScrapeReport};
pub use fetcher::{SourceFetcher, route_url};
