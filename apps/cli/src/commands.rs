//! CLI command definitions, routing, and tracing setup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lazypack_core::{Curator, Generator, StatusReporter, analyze_article, build_generator};
use lazypack_crawler::SourceFetcher;
use lazypack_discovery::{ExtractedUrls, extract_urls};
use lazypack_shared::{
    AppConfig, CurationRequest, PipelineStatus, ScrapeConfig, init_config, load_config,
    validate_api_key,
};
use serde_json::json;
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LazyPack: curate SEO summary articles from source pages.
#[derive(Parser)]
#[command(
    name = "lazypack",
    version,
    about = "Scrape source pages and write a cited summary article, or suggest internal links.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this config file instead of ~/.lazypack/lazypack.toml.
    #[arg(long, global = true, env = "LAZYPACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Article output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// The HTML fragment only.
    Html,
    /// A JSON report with sources, the section plan and the HTML.
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scrape the source URLs and write a summary article.
    Curate {
        /// Article topic.
        #[arg(long)]
        topic: String,

        /// Intro paragraph that sets the tone.
        #[arg(long, default_value = "")]
        intro: String,

        /// Section heading, in order (repeatable). Omit for the default outline.
        #[arg(long = "outline")]
        outline: Vec<String>,

        /// Source URL (repeatable).
        #[arg(long = "url")]
        urls: Vec<String>,

        /// File with source URLs: a sitemap, an HTML page or a plain list.
        #[arg(long)]
        urls_file: Option<PathBuf>,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "html")]
        format: OutputFormat,

        /// Override the generation model.
        #[arg(long)]
        model: Option<String>,

        /// Override the number of sources fetched.
        #[arg(long)]
        max_sources: Option<usize>,
    },

    /// Suggest internal links for an existing article.
    Links {
        /// Article file (Markdown or HTML).
        #[arg(long)]
        article: PathBuf,

        /// Sitemap or link list file.
        #[arg(long, conflicts_with = "sitemap_url", required_unless_present = "sitemap_url")]
        sitemap: Option<PathBuf>,

        /// Sitemap URL to download.
        #[arg(long)]
        sitemap_url: Option<String>,

        /// Override the generation model.
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the URLs found in a sitemap, HTML page or link list.
    Sitemap {
        /// File path or http(s) URL.
        source: String,

        /// Base URL for resolving relative links in HTML input.
        #[arg(long)]
        base: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lazypack=info",
        1 => "lazypack=debug",
        _ => "lazypack=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Curate {
            topic,
            intro,
            outline,
            urls,
            urls_file,
            out,
            format,
            model,
            max_sources,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(model) = model {
                config.generation.model = model;
            }
            if let Some(max) = max_sources {
                config.scrape.max_sources = max;
            }
            let request = CurationRequest {
                topic,
                intro,
                outline,
                urls: collect_urls(urls, urls_file.as_deref())?,
            };
            cmd_curate(&config, &request, out.as_deref(), format).await
        }
        Command::Links {
            article,
            sitemap,
            sitemap_url,
            model,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(model) = model {
                config.generation.model = model;
            }
            cmd_links(&config, &article, sitemap.as_deref(), sitemap_url.as_deref()).await
        }
        Command::Sitemap { source, base } => {
            let config = resolve_config(config_path)?;
            cmd_sitemap(&config, &source, base.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => lazypack_shared::load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge `--url` values with the URLs found in `--urls-file`, keeping order.
fn collect_urls(mut urls: Vec<String>, urls_file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = urls_file {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading URL file {}", path.display()))?;
        let ExtractedUrls { kind, urls: found } = extract_urls(&text, None);
        info!(?kind, count = found.len(), path = %path.display(), "loaded source URLs");
        urls.extend(found);
    }
    let mut seen = HashSet::new();
    urls.retain(|u| !u.trim().is_empty() && seen.insert(u.clone()));
    Ok(urls)
}

// ---------------------------------------------------------------------------
// curate
// ---------------------------------------------------------------------------

async fn cmd_curate(
    config: &AppConfig,
    request: &CurationRequest,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    if request.urls.is_empty() {
        return Err(eyre!("no source URLs: pass --url or --urls-file"));
    }
    validate_api_key(config)?;

    let generator: Arc<dyn Generator> = build_generator(config)?;
    let curator = Curator::new(generator, config)?;

    info!(
        topic = %request.topic,
        urls = request.urls.len(),
        model = %config.generation.model,
        "curating article"
    );

    let status = CliStatus::new()?;
    let result = curator.curate_detailed(request, &status).await;
    status.clear();
    let output = result?;

    let rendered = match format {
        OutputFormat::Html => output.html.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "runId": output.run_id.to_string(),
            "topic": request.topic,
            "generatedAt": chrono::Utc::now().to_rfc3339(),
            "sources": output.sources,
            "sections": output.drafts,
            "attempted": output.attempted,
            "failed": output.failed,
            "html": output.html,
        }))?,
    };

    emit(&rendered, out)?;

    eprintln!();
    eprintln!("  Article written!");
    eprintln!("  Run:     {}", output.run_id);
    eprintln!("  Sources: {}/{}", output.sources.len(), output.attempted);
    eprintln!("  Time:    {:.1}s", output.elapsed.as_secs_f64());
    if let Some(path) = out {
        eprintln!("  Output:  {}", path.display());
    }
    eprintln!();

    Ok(())
}

fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)
            .wrap_err_with(|| format!("writing {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// CLI status reporter
// ---------------------------------------------------------------------------

/// Spinner driven by pipeline status changes.
struct CliStatus {
    spinner: ProgressBar,
}

impl CliStatus {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl StatusReporter for CliStatus {
    fn report(&self, status: PipelineStatus) {
        match status {
            PipelineStatus::Idle => {}
            PipelineStatus::Scraping => self.spinner.set_message("Scraping sources"),
            PipelineStatus::Analyzing => self.spinner.set_message("Planning sections"),
            PipelineStatus::Writing => self.spinner.set_message("Writing article"),
            PipelineStatus::Done => self.spinner.finish_and_clear(),
        }
    }
}

// ---------------------------------------------------------------------------
// links / sitemap
// ---------------------------------------------------------------------------

async fn cmd_links(
    config: &AppConfig,
    article_path: &Path,
    sitemap: Option<&Path>,
    sitemap_url: Option<&str>,
) -> Result<()> {
    validate_api_key(config)?;

    let article = std::fs::read_to_string(article_path)
        .wrap_err_with(|| format!("reading article {}", article_path.display()))?;

    let urls = match (sitemap, sitemap_url) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("reading sitemap {}", path.display()))?;
            extract_urls(&text, None).urls
        }
        (None, Some(url)) => {
            let base = Url::parse(url).wrap_err_with(|| format!("invalid sitemap URL '{url}'"))?;
            let text = download(config, url).await?;
            extract_urls(&text, Some(&base)).urls
        }
        (None, None) => return Err(eyre!("pass --sitemap or --sitemap-url")),
    };

    info!(candidates = urls.len(), "analysing internal links");

    let generator = build_generator(config)?;
    let spinner = CliStatus::new()?;
    spinner.spinner.set_message("Analysing article");
    let result = analyze_article(generator.as_ref(), &article, &urls).await;
    spinner.clear();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn cmd_sitemap(config: &AppConfig, source: &str, base: Option<&str>) -> Result<()> {
    let remote = Url::parse(source)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"));

    let text = match &remote {
        Some(url) => download(config, url.as_str()).await?,
        None => std::fs::read_to_string(source).wrap_err_with(|| format!("reading {source}"))?,
    };

    let base = match base {
        Some(b) => Some(Url::parse(b).wrap_err_with(|| format!("invalid base URL '{b}'"))?),
        None => remote,
    };

    let extracted = extract_urls(&text, base.as_ref());
    info!(kind = ?extracted.kind, count = extracted.urls.len(), "urls extracted");

    for url in &extracted.urls {
        println!("{url}");
    }
    Ok(())
}

/// Fetch raw text through the configured retrieval routes.
async fn download(config: &AppConfig, url: &str) -> Result<String> {
    let fetcher = SourceFetcher::new(&ScrapeConfig::from(config))?;
    let text = fetcher.fetch_raw(url).await?;
    Ok(text)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
