//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/nexo/config.toml)
//! 3. Environment variables (NEXO_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_DATE_FORMAT;

/// Environment variable prefix
const ENV_PREFIX: &str = "NEXO";

/// User id used when none is configured
pub const DEFAULT_USER_ID: &str = "default-user";

/// Default bound on a single record store call
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Which record store backs the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files under the data directory
    #[default]
    File,
    /// REST API reached over HTTP at `api_url`
    Remote,
    /// REST API served in-process from the SQLite document database
    Embedded,
    /// No persistence medium at all
    Offline,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::File => "file",
            StoreBackend::Remote => "remote",
            StoreBackend::Embedded => "embedded",
            StoreBackend::Offline => "offline",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "remote" => Ok(StoreBackend::Remote),
            "embedded" => Ok(StoreBackend::Embedded),
            "offline" | "none" => Ok(StoreBackend::Offline),
            other => bail!(
                "Unknown store backend '{}'. Use file, remote, embedded or offline.",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (record files, SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Record store backend
    #[serde(default)]
    pub store: StoreBackend,

    /// Base URL of the REST API (remote backend only)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Owner of the private library namespace
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Bound on a single record store call, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// chrono format string for review and library dates
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Log level for nexo crates (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreBackend::default(),
            api_url: None,
            user_id: default_user_id(),
            store_timeout_ms: default_store_timeout_ms(),
            date_format: default_date_format(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (NEXO_DATA_DIR, NEXO_STORE, NEXO_API_URL, ...)
    /// 2. Config file (~/.config/nexo/config.toml or NEXO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_STORE", ENV_PREFIX)) {
            match val.parse() {
                Ok(store) => self.store = store,
                Err(e) => tracing::warn!("Ignoring {}_STORE: {}", ENV_PREFIX, e),
            }
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            self.api_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_USER_ID", ENV_PREFIX)) {
            if !val.is_empty() {
                self.user_id = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_STORE_TIMEOUT_MS", ENV_PREFIX)) {
            match val.parse() {
                Ok(ms) => self.store_timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid {}_STORE_TIMEOUT_MS: {}", ENV_PREFIX, val),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Set a single value by key, as used by `nexo config set`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |v: &str| {
            if v.is_empty() || v == "none" {
                None
            } else {
                Some(v.to_string())
            }
        };

        match key {
            "data_dir" => self.data_dir = value.into(),
            "store" => self.store = value.parse()?,
            "api_url" => self.api_url = optional(value),
            "user_id" => {
                if value.trim().is_empty() {
                    bail!("user_id cannot be empty");
                }
                self.user_id = value.trim().to_string();
            }
            "store_timeout_ms" => {
                self.store_timeout_ms = value
                    .parse()
                    .context("Invalid value for store_timeout_ms. Use a whole number of milliseconds.")?;
            }
            "date_format" => self.date_format = value.to_string(),
            "log_level" => self.log_level = value.to_string(),
            "log_file" => self.log_file = optional(value).map(PathBuf::from),
            _ => bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, store, api_url, user_id, store_timeout_ms, date_format, log_level, log_file",
                key
            ),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with NEXO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexo")
            .join("config.toml")
    }

    /// Directory holding the file-backed record store
    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    /// Get the path to the SQLite document database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("nexo.db")
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nexo")
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}
