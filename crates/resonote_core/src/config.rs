//! File-backed application configuration.
//!
//! # Responsibility
//! - Load runtime settings from a TOML file, defaulting every missing key.
//! - Translate settings into the typed knobs other modules take
//!   (`RetryPolicy`, `DbOptions`, `Blacklist`, HTTP timeout).
//!
//! # Invariants
//! - Secrets never live here; credentials come from the environment.
//! - Unknown keys are rejected so typos do not silently fall back to defaults.

use crate::db::DbOptions;
use crate::logging::default_log_level;
use crate::service::persistence::{Backoff, RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use crate::source::filter::{Blacklist, DEFAULT_BLACKLIST};
use crate::source::http::DEFAULT_HTTP_TIMEOUT;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "resonote.sqlite3";

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config file `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Delay schedule selector for `[retry]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Linear,
}

/// `[retry]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: u64::try_from(DEFAULT_BACKOFF.as_millis()).unwrap_or(500),
            backoff: BackoffKind::Fixed,
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub busy_timeout_ms: u64,
    pub retry: RetryConfig,
    /// Extra phrases appended to the built-in blacklist.
    pub blacklist: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: default_log_level().to_string(),
            log_dir: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            busy_timeout_ms: u64::try_from(crate::db::DEFAULT_BUSY_TIMEOUT.as_millis())
                .unwrap_or(5_000),
            retry: RetryConfig::default(),
            blacklist: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given and present, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses a TOML document without touching the filesystem.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path cannot be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry.backoff_ms);
        let backoff = match self.retry.backoff {
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Linear => Backoff::Linear { base: delay },
        };
        RetryPolicy::new(self.retry.max_attempts, backoff)
    }

    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Built-in phrases plus configured extras.
    pub fn blacklist(&self) -> Blacklist {
        Blacklist::new(
            DEFAULT_BLACKLIST
                .iter()
                .map(|phrase| phrase.to_string())
                .chain(self.blacklist.iter().cloned()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, BackoffKind, ConfigError};
    use crate::service::persistence::Backoff;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry_policy().max_attempts(), 3);
        assert_eq!(
            config.retry_policy().backoff(),
            Backoff::Fixed(Duration::from_millis(500))
        );
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn parses_nested_retry_and_blacklist() {
        let config = AppConfig::from_toml_str(
            r#"
            db_path = "/tmp/library.sqlite3"
            blacklist = ["Sponsored"]

            [retry]
            max_attempts = 5
            backoff_ms = 50
            backoff = "linear"
            "#,
        )
        .expect("config should parse");
        assert_eq!(config.retry.backoff, BackoffKind::Linear);
        assert_eq!(
            config.retry_policy().backoff().delay(2),
            Duration::from_millis(100)
        );
        let blacklist = config.blacklist();
        assert_eq!(
            blacklist.phrases(),
            &["corrections and clarifications".to_string(), "sponsored".to_string()]
        );
    }

    #[test]
    fn rejects_unknown_keys_and_zero_attempts() {
        assert!(matches!(
            AppConfig::from_toml_str("db_pth = \"x\""),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[retry]\nmax_attempts = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error_but_optional_path_defaults() {
        let missing = std::path::Path::new("/definitely/not/here/resonote.toml");
        assert!(matches!(AppConfig::load(missing), Err(ConfigError::Io { .. })));
        let config = AppConfig::load_or_default(Some(missing)).expect("missing path defaults");
        assert_eq!(config, AppConfig::default());
    }
}
