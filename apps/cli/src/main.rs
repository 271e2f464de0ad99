//! LazyPack CLI: SEO "lazy pack" content curation.
//!
//! Scrapes a handful of source pages and turns them into one cited summary
//! article, or proposes internal links for an existing article.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
