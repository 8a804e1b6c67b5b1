//! Application configuration.
//!
//! # Responsibility
//! - Load settings from an optional TOML file.
//! - Apply environment overrides (including a `.env` file when present).
//!
//! # Invariants
//! - Blank strings are treated as unset.
//! - A missing default config file is not an error; a missing explicit one is.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_REMOTE_URL: &str = "REMINDERS_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "REMINDERS_REMOTE_KEY";
pub const ENV_REMOTE_TABLE: &str = "REMINDERS_REMOTE_TABLE";
pub const ENV_REMOTE_POLL_SECS: &str = "REMINDERS_REMOTE_POLL_SECS";
pub const ENV_DB_PATH: &str = "REMINDERS_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "REMINDERS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "REMINDERS_LOG_DIR";
pub const ENV_AI_PROVIDER: &str = "AI_PROVIDER";
pub const ENV_AI_API_KEY: &str = "AI_API_KEY";
pub const ENV_AI_ALT_URL: &str = "AI_ALT_URL";
pub const ENV_AI_BASE_URL: &str = "AI_BASE_URL";
pub const ENV_AI_MODEL: &str = "AI_MODEL";

const DEFAULT_CONFIG_FILE: &str = "reminders.toml";
const DEFAULT_DB_PATH: &str = ".reminders/reminders.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        key: &'static str,
        value: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub ai: AiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub db_path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// Remote table connection settings. Both `url` and `api_key` are required
/// for the remote store to be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub timeout_secs: u64,
    /// Enables the change poller when set.
    pub poll_interval_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "reminders".to_string(),
            timeout_secs: 10,
            poll_interval_secs: None,
        }
    }
}

impl RemoteConfig {
    /// Returns `(url, api_key)` when both are set and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = non_blank(self.url.as_deref())?;
        let key = non_blank(self.api_key.as_deref())?;
        Some((url, key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub api_key: Option<String>,
    /// Alternate text-transform endpoint tried once before the provider.
    pub alt_url: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            alt_url: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// File logging is disabled when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

impl AppConfig {
    /// Loads configuration from `path` (or `reminders.toml`) plus the process
    /// environment and `.env`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies overrides from a key lookup (normally the process environment).
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_REMOTE_URL) {
            self.remote.url = Some(value);
        }
        if let Some(value) = get(ENV_REMOTE_KEY) {
            self.remote.api_key = Some(value);
        }
        if let Some(value) = get(ENV_REMOTE_TABLE) {
            self.remote.table = value;
        }
        if let Some(value) = get(ENV_REMOTE_POLL_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_REMOTE_POLL_SECS,
                    value: value.clone(),
                })?;
            self.remote.poll_interval_secs = Some(secs);
        }
        if let Some(value) = get(ENV_DB_PATH) {
            self.local.db_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            self.log.level = value;
        }
        if let Some(value) = get(ENV_LOG_DIR) {
            self.log.dir = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_AI_PROVIDER) {
            self.ai.provider = value;
        }
        if let Some(value) = get(ENV_AI_API_KEY) {
            self.ai.api_key = Some(value);
        }
        if let Some(value) = get(ENV_AI_ALT_URL) {
            self.ai.alt_url = Some(value);
        }
        if let Some(value) = get(ENV_AI_BASE_URL) {
            self.ai.base_url = value;
        }
        if let Some(value) = get(ENV_AI_MODEL) {
            self.ai.model = value;
        }
        Ok(())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
