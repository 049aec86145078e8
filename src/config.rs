//! Pipeline configuration loaded from a YAML file.
//!
//! Secrets (API keys, library credentials) live in the same file, so the
//! default location is `./config.yaml` with a fallback to the user config dir.

use crate::error::{DigestError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Longest anti-automation pause accepted from config
const MAX_DELAY_SECS: f64 = 3600.0;

/// Default Chrome-like user agent for the library session
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Resolve the config file path: explicit path, `./config.yaml`, then the
/// user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    dirs::config_dir()
        .map(|p| p.join("paperdigest").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
        .ok_or_else(|| {
            DigestError::Config(format!(
                "No {} in the working directory or user config directory",
                CONFIG_FILE_NAME
            ))
        })
}

/// Full pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub elsevier: ElsevierConfig,
    pub library: LibraryConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    pub gemini: GeminiSettings,
    pub notion: NotionSettings,
}

/// Scopus search settings
#[derive(Debug, Clone, Deserialize)]
pub struct ElsevierConfig {
    pub api_key: String,
    pub query: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Stop paging after this many entries
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Institutional proxy login settings
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// A successful login lands on a URL starting with this prefix
    #[serde(default = "default_authenticated_prefix")]
    pub authenticated_prefix: String,
    /// Prepended to every article URL
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    #[serde(default = "default_username_selector")]
    pub username_selector: String,
    #[serde(default = "default_password_selector")]
    pub password_selector: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Scraping stage settings
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_output")]
    pub output_folder: PathBuf,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_document_bytes")]
    pub min_document_bytes: u64,
    #[serde(default = "default_delay_min")]
    pub delay_min_secs: f64,
    #[serde(default = "default_delay_max")]
    pub delay_max_secs: f64,
    /// Bounded wait for login and for article content
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            output_folder: default_scrape_output(),
            max_retries: default_max_retries(),
            min_document_bytes: default_min_document_bytes(),
            delay_min_secs: default_delay_min(),
            delay_max_secs: default_delay_max(),
            wait_secs: default_wait_secs(),
        }
    }
}

impl ScrapeConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }
}

/// Gemini summarization settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_summary_output")]
    pub output_folder: PathBuf,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: usize,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

/// Notion upload settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotionSettings {
    pub api_token: String,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub parent_page_id: Option<String>,
    #[serde(default)]
    pub new_database_title: Option<String>,
}

fn default_page_size() -> usize {
    25
}
fn default_login_url() -> String {
    "https://library.yonsei.ac.kr/login".to_string()
}
fn default_authenticated_prefix() -> String {
    "https://library.yonsei.ac.kr/".to_string()
}
fn default_proxy_prefix() -> String {
    "https://access.yonsei.ac.kr/link.n2s?url=".to_string()
}
fn default_username_selector() -> String {
    "#id".to_string()
}
fn default_password_selector() -> String {
    "#password".to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_scrape_output() -> PathBuf {
    PathBuf::from("data/scrap")
}
fn default_max_retries() -> u32 {
    3
}
fn default_min_document_bytes() -> u64 {
    crate::models::MIN_DOCUMENT_BYTES
}
fn default_delay_min() -> f64 {
    2.0
}
fn default_delay_max() -> f64 {
    5.0
}
fn default_wait_secs() -> u64 {
    10
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_summary_output() -> PathBuf {
    PathBuf::from("data/gemini")
}
fn default_rpm() -> usize {
    10
}
fn default_pacing_ms() -> u64 {
    500
}

impl PipelineConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = ?path, "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        info!(path = ?path, "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage fail later in a confusing way
    pub fn validate(&self) -> Result<()> {
        require("elsevier.api_key", &self.elsevier.api_key)?;
        require("elsevier.query", &self.elsevier.query)?;
        require("library.username", &self.library.username)?;
        require("library.password", &self.library.password)?;
        require("gemini.api_key", &self.gemini.api_key)?;
        require("notion.api_token", &self.notion.api_token)?;

        if self.elsevier.page_size == 0 {
            return Err(DigestError::Config("elsevier.page_size must be > 0".to_string()));
        }
        if self.scrape.max_retries == 0 {
            return Err(DigestError::Config("scrape.max_retries must be > 0".to_string()));
        }
        if self.gemini.requests_per_minute == 0 {
            return Err(DigestError::Config(
                "gemini.requests_per_minute must be > 0".to_string(),
            ));
        }
        let (min, max) = (self.scrape.delay_min_secs, self.scrape.delay_max_secs);
        if !(0.0..=MAX_DELAY_SECS).contains(&max) || !(0.0..=max).contains(&min) {
            return Err(DigestError::Config(format!(
                "Invalid delay range {}..{}",
                self.scrape.delay_min_secs, self.scrape.delay_max_secs
            )));
        }
        Ok(())
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DigestError::Config(format!("{} is required", name)));
    }
    Ok(())
}
