//! Store configuration resolution.
//!
//! Priority, highest first:
//! 1. Explicit overrides from the caller (CLI flags)
//! 2. Environment variables (`FASTLIST_DATA_DIR`, `FASTLIST_LOG_LEVEL`)
//! 3. Compiled defaults (platform data dir, build-mode log level)

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "FASTLIST_DATA_DIR";
pub const LOG_LEVEL_ENV: &str = "FASTLIST_LOG_LEVEL";
pub const DEFAULT_DB_FILE_NAME: &str = "fastlist.sqlite3";
const APP_DIR_NAME: &str = "fastlist";
const LOG_DIR_NAME: &str = "logs";

/// Errors from configuration resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Log level is not one of the supported names.
    InvalidLogLevel(String),
    /// Data directory override is empty.
    EmptyDataDir,
    /// Relative data directory could not be anchored to the working directory.
    UnresolvableDataDir(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::EmptyDataDir => write!(f, "data directory must not be empty"),
            Self::UnresolvableDataDir(message) => {
                write!(f, "cannot resolve relative data directory: {message}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Caller-supplied overrides; `None` falls through to env and defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Resolved store configuration. `data_dir` is always absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub log_level: &'static str,
}

impl StoreConfig {
    /// Resolves configuration from overrides, process environment and defaults.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolves configuration with an explicit environment lookup.
    pub fn resolve(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match overrides.data_dir.clone() {
            Some(dir) => dir,
            None => env(DATA_DIR_ENV)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
        };
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        let data_dir = absolutize(data_dir)?;

        let log_level = match overrides.log_level.clone().or_else(|| env(LOG_LEVEL_ENV)) {
            Some(level) => normalize_level(&level).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        Ok(Self {
            data_dir,
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            log_level,
        })
    }

    /// Location of the SQLite file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    /// Directory receiving rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }
}

fn absolutize(dir: PathBuf) -> Result<PathBuf, ConfigError> {
    if dir.is_absolute() {
        return Ok(dir);
    }
    let cwd = std::env::current_dir()
        .map_err(|err| ConfigError::UnresolvableDataDir(err.to_string()))?;
    Ok(cwd.join(dir))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| Path::new(".").join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConfigOverrides, StoreConfig, DATA_DIR_ENV, LOG_LEVEL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let env = env_from(&[(DATA_DIR_ENV, "/tmp/fastlist-env"), (LOG_LEVEL_ENV, "WARN")]);
        let config = StoreConfig::resolve(&ConfigOverrides::default(), env).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/fastlist-env"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(
            config.db_path(),
            PathBuf::from("/tmp/fastlist-env/fastlist.sqlite3")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/fastlist-env/logs"));
    }

    #[test]
    fn explicit_overrides_win_over_env() {
        let env = env_from(&[(DATA_DIR_ENV, "/tmp/from-env"), (LOG_LEVEL_ENV, "error")]);
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/tmp/from-flag")),
            log_level: Some("trace".to_string()),
        };
        let config = StoreConfig::resolve(&overrides, env).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/from-flag"));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn blank_env_data_dir_falls_back_to_default() {
        let env = env_from(&[(DATA_DIR_ENV, "  ")]);
        let config = StoreConfig::resolve(&ConfigOverrides::default(), env).unwrap();
        assert!(config.data_dir.ends_with("fastlist"));
        assert!(config.data_dir.is_absolute());
    }

    #[test]
    fn relative_data_dir_resolves_to_absolute_paths() {
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("data")),
            log_level: None,
        };
        let config = StoreConfig::resolve(&overrides, env_from(&[])).unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.data_dir, cwd.join("data"));
        assert!(config.log_dir().is_absolute());
        assert!(config.log_dir().ends_with("data/logs"));
        assert!(config.db_path().is_absolute());
    }

    #[test]
    fn rejects_unknown_level_and_empty_dir() {
        let overrides = ConfigOverrides {
            data_dir: None,
            log_level: Some("loud".to_string()),
        };
        let err = StoreConfig::resolve(&overrides, env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(message) if message.contains("loud")));

        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::new()),
            log_level: None,
        };
        let err = StoreConfig::resolve(&overrides, env_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyDataDir);
    }
}
