//! Persisted configuration for gator.
//!
//! Configuration is read from `~/.config/gator/config.toml` (or the path given
//! with `--config`) at startup. The file is required: a missing or invalid file
//! stops the process before any command runs.
//!
//! The only field gator writes back is `current_user_name`, updated by the
//! `login` and `register` commands.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Marker sent as `User-Agent` on every feed retrieval unless overridden.
pub const DEFAULT_USER_AGENT: &str = "gator";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BROWSE_LIMIT: usize = 2;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to `<data_dir>/gator/gator.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
    pub fetch: FetchConfig,
    pub browse: BrowseConfig,
    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub default_limit: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_BROWSE_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing {
                    path: config_path.clone(),
                }
            } else {
                ConfigError::Io {
                    path: config_path.clone(),
                    source: e,
                }
            }
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.clone(),
            source: e,
        })?;
        config.path = config_path;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            path: self.path.clone(),
            message: message.to_string(),
        };

        if self.fetch.timeout_secs == 0 {
            return Err(invalid("fetch.timeout_secs must be at least 1"));
        }
        if self.browse.default_limit == 0 {
            return Err(invalid("browse.default_limit must be at least 1"));
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/gator/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("gator").join("config.toml"))
    }

    /// Path the configuration was loaded from and is saved back to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the database file, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref p) = self.db_path {
            return Ok(p.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir.join("gator").join("gator.db"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user_name.as_deref()
    }

    /// Record `name` as the current user and persist the file.
    pub fn set_current_user(&mut self, name: &str) -> Result<(), ConfigError> {
        self.current_user_name = Some(name.to_string());
        self.save()
    }

    /// Write the configuration back to the path it was loaded from.
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        fs::write(&self.path, content).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Config file not found at {path}")]
    Missing { path: PathBuf },

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config at {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
}
