//! ivarpool configuration system
//!
//! Pool and logging settings, loaded from TOML with merge semantics.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (IVARPOOL_*)
//! 3. Explicit config file (--config)
//! 4. User-level (~/.config/ivarpool/config.toml)
//! 5. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use ivarpool::util::config::{load_user_config, Config};
//!
//! // Load user-level config (defaults if not present)
//! let config = load_user_config().unwrap();
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::scheduler::{FaultPolicy, PoolConfig};
use crate::util::logger::LogLevel;

/// Environment variable overriding `pool.num_workers`
pub const ENV_WORKERS: &str = "IVARPOOL_WORKERS";
/// Environment variable overriding `pool.max_queue_size`
pub const ENV_QUEUE_CAPACITY: &str = "IVARPOOL_QUEUE_CAPACITY";
/// Environment variable overriding `pool.fault_policy`
pub const ENV_FAULT_POLICY: &str = "IVARPOOL_FAULT_POLICY";
/// Environment variable overriding `log.level`
pub const ENV_LOG_LEVEL: &str = "IVARPOOL_LOG";

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Task pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Maximum level printed
    #[serde(default)]
    pub level: LogLevel,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Cannot determine config directory")]
    NoConfigDir,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("ivarpool"));
    }

    // Fallback to ~/.config/ivarpool
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("ivarpool"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("ivarpool"));
    }

    None
}

/// Get the user config file path (~/.config/ivarpool/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<Config, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => Ok(Config::default()),
    }
}

/// Save configuration as pretty TOML, creating parent directories
pub fn save_config(
    path: &Path,
    config: &Config,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Save user-level configuration
pub fn save_user_config(config: &Config) -> Result<(), ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config(&path, config)
}

/// Apply `IVARPOOL_*` environment overrides on top of `config`
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

/// Apply overrides from an arbitrary variable source
pub fn apply_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(ENV_WORKERS) {
        config.pool.num_workers = parse_env(ENV_WORKERS, &value)?;
    }

    if let Some(value) = lookup(ENV_QUEUE_CAPACITY) {
        config.pool.max_queue_size = parse_env(ENV_QUEUE_CAPACITY, &value)?;
    }

    if let Some(value) = lookup(ENV_FAULT_POLICY) {
        config.pool.fault_policy = match value.as_str() {
            "abort_task" | "task" => FaultPolicy::AbortTask,
            "abort_process" | "process" => FaultPolicy::AbortProcess,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_FAULT_POLICY,
                    value,
                })
            }
        };
    }

    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.log.level = value.parse().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_LOG_LEVEL,
            value: value.clone(),
        })?;
    }

    Ok(())
}

fn parse_env(
    var: &'static str,
    value: &str,
) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

/// Resolve the effective configuration: explicit file if given, else the
/// user-level file, else defaults; then environment overrides.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => load_user_config()?,
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}
