//! Application configuration for LazyPack.
//!
//! User config lives at `~/.lazypack/lazypack.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LazyPackError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lazypack.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lazypack";

// ---------------------------------------------------------------------------
// Config structs (matching lazypack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Source scraping settings.
    #[serde(default)]
    pub scrape: ScrapeSettings,

    /// Editor style rules.
    #[serde(default)]
    pub style: StyleConfig,
}

/// Which generation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions on OpenRouter.
    Openrouter,
    /// A curation proxy accepting `{ prompt, systemInstruction, responseSchema }`.
    Proxy,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend to use.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier passed to the backend.
    #[serde(default = "default_model")]
    pub model: String,

    /// Endpoint URL. For `proxy` this is the curate route of the proxy.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout for one generation call.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Openrouter
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.5-pro".into()
}
fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_generation_timeout() -> u64 {
    120
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    /// Maximum number of source URLs fetched per run.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Timeout for a single retrieval attempt.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Bodies at or below this many bytes are treated as proxy stand-ins.
    #[serde(default = "default_min_body_len")]
    pub min_body_len: usize,

    /// Sources with this many characters of text or fewer are discarded.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Maximum characters of cleaned text kept per source.
    #[serde(default = "default_content_budget")]
    pub content_budget: usize,

    /// Retrieval route templates, tried in order.
    /// `{url}` is replaced by the percent-encoded source URL, `{raw_url}` verbatim.
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,

    /// Allow fetching loopback/private hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_sources: default_max_sources(),
            timeout_secs: default_fetch_timeout(),
            min_body_len: default_min_body_len(),
            min_content_chars: default_min_content_chars(),
            content_budget: default_content_budget(),
            routes: default_routes(),
            allow_private_hosts: false,
        }
    }
}

fn default_max_sources() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_min_body_len() -> usize {
    200
}
fn default_min_content_chars() -> usize {
    50
}
fn default_content_budget() -> usize {
    15_000
}
fn default_routes() -> Vec<String> {
    vec![
        "{raw_url}".into(),
        "https://corsproxy.io/?{url}".into(),
        "https://api.allorigins.win/raw?url={url}".into(),
    ]
}

/// `[style]` section: advisory rules handed to the editor stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Output language of the article.
    #[serde(default = "default_language")]
    pub language: String,

    /// Target length of each section's prose.
    #[serde(default = "default_section_length")]
    pub section_length: String,

    /// How `<h2>` headings should be phrased.
    #[serde(default = "default_heading_style")]
    pub heading_style: String,

    /// Terminology and punctuation conventions.
    #[serde(default = "default_terminology")]
    pub terminology: Vec<String>,

    /// Phrases the article must never contain.
    #[serde(default = "default_banned_phrases")]
    pub banned_phrases: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            section_length: default_section_length(),
            heading_style: default_heading_style(),
            terminology: default_terminology(),
            banned_phrases: default_banned_phrases(),
        }
    }
}

fn default_language() -> String {
    "Traditional Chinese (繁體中文)".into()
}
fn default_section_length() -> String {
    "150-250 characters of prose per section".into()
}
fn default_heading_style() -> String {
    "Keep each outline heading exactly as given; do not add numbering or emoji".into()
}
fn default_terminology() -> Vec<String> {
    vec![
        "Use full-width punctuation (，。：「」) in Chinese sentences".into(),
        "Put a half-width space between Chinese and English words or numbers".into(),
        "Keep product and brand names in their original spelling".into(),
    ]
}
fn default_banned_phrases() -> Vec<String> {
    vec![
        "總而言之".into(),
        "不可否認".into(),
        "在這個瞬息萬變的時代".into(),
        "讓我們一起來看看".into(),
    ]
}

// ---------------------------------------------------------------------------
// Scrape config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Maximum number of URLs fanned out per run.
    pub max_sources: usize,
    /// Per-attempt timeout.
    pub attempt_timeout: Duration,
    /// Minimum plausible body length in bytes (exclusive).
    pub min_body_len: usize,
    /// Minimum usable content length in characters (exclusive).
    pub min_content_chars: usize,
    /// Content budget in characters.
    pub content_budget: usize,
    /// Ordered retrieval route templates.
    pub routes: Vec<String>,
    /// Allow loopback/private hosts.
    pub allow_private_hosts: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScrapeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_sources: config.scrape.max_sources,
            attempt_timeout: Duration::from_secs(config.scrape.timeout_secs),
            min_body_len: config.scrape.min_body_len,
            min_content_chars: config.scrape.min_content_chars,
            content_budget: config.scrape.content_budget,
            routes: config.scrape.routes.clone(),
            allow_private_hosts: config.scrape.allow_private_hosts,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lazypack/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LazyPackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lazypack/lazypack.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LazyPackError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LazyPackError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.scrape.routes.is_empty() {
        return Err(LazyPackError::config("[scrape].routes must list at least one route"));
    }
    if let Some(route) = config
        .scrape
        .routes
        .iter()
        .find(|r| !r.contains("{url}") && !r.contains("{raw_url}"))
    {
        return Err(LazyPackError::config(format!(
            "route '{route}' has no {{url}} or {{raw_url}} placeholder"
        )));
    }
    if config.scrape.max_sources == 0 {
        return Err(LazyPackError::config("[scrape].max_sources must be at least 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LazyPackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LazyPackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LazyPackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.generation.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(LazyPackError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the API key env var is set when the backend needs one.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    match config.generation.backend {
        BackendKind::Openrouter => resolve_api_key(config).map(|_| ()),
        // The proxy holds the vendor key itself.
        BackendKind::Proxy => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_sources"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("{raw_url}"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scrape.max_sources, 5);
        assert_eq!(parsed.generation.backend, BackendKind::Openrouter);
        assert_eq!(parsed.style.banned_phrases.len(), 4);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[generation]
backend = "proxy"
endpoint = "http://localhost:8787/api/curate"

[scrape]
max_sources = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.generation.backend, BackendKind::Proxy);
        assert_eq!(config.scrape.max_sources, 3);
        assert_eq!(config.scrape.content_budget, 15_000);
        assert_eq!(config.scrape.routes.len(), 3);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn scrape_config_from_app_config() {
        let app = AppConfig::default();
        let scrape = ScrapeConfig::from(&app);
        assert_eq!(scrape.max_sources, 5);
        assert_eq!(scrape.attempt_timeout, Duration::from_secs(10));
        assert_eq!(scrape.min_content_chars, 50);
        assert!(!scrape.allow_private_hosts);
    }

    #[test]
    fn route_without_placeholder_is_rejected() {
        let mut config = AppConfig::default();
        config.scrape.routes = vec!["https://proxy.example.com/fetch".into()];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.generation.api_key_env = "LP_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));

        config.generation.backend = BackendKind::Proxy;
        assert!(validate_api_key(&config).is_ok());
    }
}
