//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Runtime tunables (worker timing, rate limits) live in the database
//! `settings` table, see [`crate::db::settings`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "BIZVAL_ROOT_FOLDER";
/// Environment variable overriding the HTTP bind address
pub const ENV_BIND: &str = "BIZVAL_BIND";
/// Environment variable carrying the LLM API key
pub const ENV_LLM_API_KEY: &str = "BIZVAL_LLM_API_KEY";
/// Environment variable carrying the billing provider secret key
pub const ENV_BILLING_SECRET_KEY: &str = "BIZVAL_STRIPE_SECRET_KEY";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "bizval.db";

/// Default bind address for bizval-fn
pub const DEFAULT_BIND: &str = "127.0.0.1:5740";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding bizval.db
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address for bizval-fn
    #[serde(default)]
    pub bind: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub billing: BillingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Analysis model provider (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_llm_api_url(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Checkout provider (Stripe-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_billing_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_billing_api_base(),
            secret_key: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_billing_api_base() -> String {
    "https://api.stripe.com".to_string()
}

/// Locate the config file for the platform
///
/// Linux checks `~/.config/bizval/config.toml` then `/etc/bizval/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("bizval").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bizval/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load TOML configuration
///
/// An explicit path must exist and parse. Without one, the platform config
/// file is used when present; a missing file is not an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Some(p) => p,
            None => {
                warn!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Resolve the root folder: CLI → environment → TOML → compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Resolve the HTTP bind address: CLI → environment → TOML → default
pub fn resolve_bind(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    if let Some(bind) = cli_arg {
        return bind.to_string();
    }
    if let Ok(bind) = std::env::var(ENV_BIND) {
        if !bind.trim().is_empty() {
            return bind;
        }
    }
    toml_config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}

/// Resolve a secret from environment first, then TOML
///
/// Blank values are treated as absent.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if is_valid_key(&value) {
            return Some(value);
        }
    }
    toml_value.filter(|v| is_valid_key(v)).map(str::to_string)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/bizval (or /var/lib/bizval for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("bizval"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/bizval"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("bizval"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/bizval"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("bizval"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\bizval"))
    } else {
        PathBuf::from("./bizval_data")
    }
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE))
}
