//! Application configuration for regmonitor.
//!
//! User config lives at `~/.regmonitor/regmonitor.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "regmonitor.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".regmonitor";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "regmonitor.db";

// ---------------------------------------------------------------------------
// Config structs (matching regmonitor.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Content classifier (LLM) settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Impact assessor settings.
    #[serde(default)]
    pub assessor: AssessorConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database path. Defaults to `~/.regmonitor/regmonitor.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// Maximum concurrent source crawls.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Page fetch timeout in seconds, applied to sources without their
    /// own `timeout_secs` override.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Fallback crawl interval in hours when a source has no
    /// `update_frequency` of its own.
    #[serde(default = "default_crawl_interval")]
    pub crawl_interval_hours: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            workers: default_workers(),
            fetch_timeout_secs: default_fetch_timeout(),
            crawl_interval_hours: default_crawl_interval(),
        }
    }
}

fn default_workers() -> u32 {
    4
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_crawl_interval() -> i64 {
    24
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Chat-completions endpoint for the LLM classifier.
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model to use for classification.
    #[serde(default = "default_model")]
    pub model: String,

    /// Classification call timeout in seconds. On timeout the pipeline
    /// falls back to rule-based classification.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

fn default_classifier_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_classifier_timeout() -> u64 {
    20
}

/// `[assessor]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessorConfig {
    /// Base URL of the impact-assessment service. When unset, fan-out
    /// is skipped entirely (useful for local dry runs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.regmonitor/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MonitorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.regmonitor/regmonitor.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value or the default
/// location inside the config directory.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.defaults.db_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join(DB_FILE_NAME)),
    }
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
    let content = std::fs::read_to_string(path).map_err(|e| MonitorError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MonitorError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MonitorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MonitorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MonitorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the classifier API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.classifier.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(MonitorError::config(format!(
            "classifier API key not found. Set the {var_name} environment variable."
        ))),
    }
}
