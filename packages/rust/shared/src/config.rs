//! Application configuration for Leadsense.
//!
//! User config lives at `~/.leadsense/leadsense.toml`.
//! Missing files and missing fields fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeadsenseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadsense.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadsense";

// ---------------------------------------------------------------------------
// Config structs (matching leadsense.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Completion API settings (OpenRouter, OpenAI-compatible).
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Scraping limits.
    #[serde(default)]
    pub scraper: ScraperConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the lead database. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Wall-clock limit for one scrape batch, in seconds.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            batch_timeout_secs: default_batch_timeout(),
        }
    }
}

fn default_db_path() -> String {
    "~/.leadsense/leadsense.db".into()
}
fn default_batch_timeout() -> u64 {
    120
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Model used for every extraction and agent call.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Upper bound on completion tokens per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            model: default_model(),
            base_url: default_llm_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_max_tokens() -> u32 {
    2000
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the Serper API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Only the first N generated queries are executed.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Organic results kept per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Results requested from the API per query.
    #[serde(default = "default_num")]
    pub num: u32,

    /// Country bias (`gl`).
    #[serde(default = "default_country")]
    pub country: String,

    /// Interface language (`hl`).
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            max_queries: default_max_queries(),
            results_per_query: default_results_per_query(),
            num: default_num(),
            country: default_country(),
            language: default_language(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_max_queries() -> usize {
    3
}
fn default_results_per_query() -> usize {
    2
}
fn default_num() -> u32 {
    3
}
fn default_country() -> String {
    "ch".into()
}
fn default_language() -> String {
    "en".into()
}

/// `[scraper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// URLs processed per batch; the rest are ignored.
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Per-request fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Character budget for preprocessed listing text.
    #[serde(default = "default_listing_budget")]
    pub listing_budget: usize,

    /// Characters of raw markup sent for single-company extraction.
    #[serde(default = "default_single_page_chars")]
    pub single_page_chars: usize,

    /// Companies kept per aggregator page.
    #[serde(default = "default_max_aggregator_companies")]
    pub max_aggregator_companies: usize,

    /// Search results used for the metadata fallback.
    #[serde(default = "default_fallback_results")]
    pub fallback_results: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            fetch_timeout_secs: default_fetch_timeout(),
            listing_budget: default_listing_budget(),
            single_page_chars: default_single_page_chars(),
            max_aggregator_companies: default_max_aggregator_companies(),
            fallback_results: default_fallback_results(),
        }
    }
}

fn default_max_urls() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    15
}
fn default_listing_budget() -> usize {
    12_000
}
fn default_single_page_chars() -> usize {
    5_000
}
fn default_max_aggregator_companies() -> usize {
    10
}
fn default_fallback_results() -> usize {
    3
}

// ---------------------------------------------------------------------------
// Scrape config (runtime)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration, resolved from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Maximum URLs processed per batch.
    pub max_urls: usize,
    /// Fetch timeout per URL.
    pub fetch_timeout: Duration,
    /// Listing preprocessor character budget.
    pub listing_budget: usize,
    /// Markup prefix length for single-company extraction.
    pub single_page_chars: usize,
    /// Maximum companies kept from one aggregator page.
    pub max_aggregator_companies: usize,
    /// Search results handed to the metadata fallback.
    pub fallback_results: usize,
    /// Overall deadline for a batch; `None` waits for every unit.
    pub batch_timeout: Option<Duration>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScrapeConfig {
    fn from(config: &AppConfig) -> Self {
        let batch_timeout = match config.defaults.batch_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            max_urls: config.scraper.max_urls,
            fetch_timeout: Duration::from_secs(config.scraper.fetch_timeout_secs),
            listing_budget: config.scraper.listing_budget,
            single_page_chars: config.scraper.single_page_chars,
            max_aggregator_companies: config.scraper.max_aggregator_companies,
            fallback_results: config.scraper.fallback_results,
            batch_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadsense/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadsenseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadsense/leadsense.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| LeadsenseError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LeadsenseError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadsenseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadsenseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadsenseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path, expanding a leading `~/`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    expand_home(&config.defaults.db_path)
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| LeadsenseError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Read an API key from the env var named in config.
pub fn read_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LeadsenseError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both the completion and the search API keys are available.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    read_api_key(&config.llm.api_key_env)?;
    read_api_key(&config.search.api_key_env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("db_path"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("SERPER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scraper.max_urls, 5);
        assert_eq!(parsed.llm.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[scraper]
max_urls = 8

[search]
country = "de"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.scraper.max_urls, 8);
        assert_eq!(config.scraper.fetch_timeout_secs, 15);
        assert_eq!(config.search.country, "de");
        assert_eq!(config.search.language, "en");
        assert_eq!(config.defaults.batch_timeout_secs, 120);
    }

    #[test]
    fn scrape_config_from_app_config() {
        let app = AppConfig::default();
        let scrape = ScrapeConfig::from(&app);
        assert_eq!(scrape.max_urls, 5);
        assert_eq!(scrape.fetch_timeout, Duration::from_secs(15));
        assert_eq!(scrape.listing_budget, 12_000);
        assert_eq!(scrape.batch_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn zero_batch_timeout_disables_deadline() {
        let mut app = AppConfig::default();
        app.defaults.batch_timeout_secs = 0;
        assert!(ScrapeConfig::from(&app).batch_timeout.is_none());
    }

    #[test]
    fn absolute_db_path_is_kept() {
        let mut app = AppConfig::default();
        app.defaults.db_path = "/tmp/leads.db".into();
        assert_eq!(resolve_db_path(&app).unwrap(), PathBuf::from("/tmp/leads.db"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "LS_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
