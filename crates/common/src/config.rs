//! Configuration for the voting core
//!
//! Configuration is read from YAML files and can be overridden through
//! `VOTING_*` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming a configuration file
pub const CONFIG_FILE_VAR: &str = "VOTING_CONFIG_FILE";

/// Base trait for all configuration types
pub trait Configuration: Serialize + for<'de> Deserialize<'de> + Default {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Load configuration from a file
    fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a string
    fn from_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Base name of the log files
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_name: default_log_file_name(),
        }
    }
}

/// Batch executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound of operation groups dispatched at once
    #[serde(default = "default_max_concurrent_operations")]
    pub max_concurrent_operations: usize,

    /// Re-read keypads and proxy edges whose update failed
    #[serde(default = "default_refresh_on_failure")]
    pub refresh_on_failure: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: default_max_concurrent_operations(),
            refresh_on_failure: default_refresh_on_failure(),
        }
    }
}

/// Top level configuration of the voting core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Application environment (development, testing, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_name() -> String {
    "assembly-voting.log".to_string()
}

fn default_max_concurrent_operations() -> usize {
    64
}

fn default_refresh_on_failure() -> bool {
    true
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log: LogConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Configuration for VotingConfig {
    fn validate(&self) -> Result<()> {
        match self.environment.as_str() {
            "development" | "testing" | "production" => {}
            _ => {
                return Err(Error::configuration(format!(
                    "Invalid environment: {}",
                    self.environment
                )))
            }
        }

        match self.log.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::configuration(format!(
                    "Invalid log level: {}",
                    self.log.level
                )))
            }
        }

        if self.log.file_name.trim().is_empty() {
            return Err(Error::configuration("Log file name must not be empty"));
        }

        if self.executor.max_concurrent_operations == 0 {
            return Err(Error::configuration(
                "executor.max_concurrent_operations must be at least 1",
            ));
        }

        Ok(())
    }
}

impl VotingConfig {
    /// Load configuration from the environment.
    ///
    /// When `VOTING_CONFIG_FILE` points to an existing file it is loaded first;
    /// the remaining `VOTING_*` variables override individual values.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(CONFIG_FILE_VAR) {
            Ok(path) if Path::new(&path).exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        if let Ok(environment) = env::var("VOTING_ENVIRONMENT") {
            config.environment = environment;
        }

        if let Ok(level) = env::var("VOTING_LOG_LEVEL") {
            config.log.level = level.to_lowercase();
        }

        if let Ok(dir) = env::var("VOTING_LOG_DIR") {
            config.log.directory = Some(PathBuf::from(dir));
        }

        if let Ok(limit) = env::var("VOTING_MAX_CONCURRENT_OPERATIONS") {
            config.executor.max_concurrent_operations = limit.parse().map_err(|e| {
                Error::configuration(format!(
                    "Invalid value for VOTING_MAX_CONCURRENT_OPERATIONS '{}': {}",
                    limit, e
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Create the log directory if one is configured
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(dir) = &self.log.directory {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    Error::configuration(format!(
                        "Failed to create directory '{}': {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }
}
