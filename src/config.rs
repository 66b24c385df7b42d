//! Configuration module for loading and parsing TOML configuration files.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bitrix24 connection settings.
    pub bitrix24: Bitrix24Config,
}

/// Settings for a [`DealsClient`](crate::DealsClient).
///
/// Fixed at construction; the client never mutates them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Bitrix24Config {
    /// Incoming webhook URL, e.g. `https://portal.bitrix24.ru/rest/1/secret`.
    pub webhook_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Assignee applied to new deals that do not set `ASSIGNED_BY_ID`.
    #[serde(default)]
    pub default_assignee: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Bitrix24Config {
    /// Creates a configuration for the given webhook with default settings.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_assignee: None,
            headers: BTreeMap::new(),
        }
    }

    /// Sets the default assignee.
    #[must_use]
    pub fn with_default_assignee(mut self, user_id: impl Into<String>) -> Self {
        self.default_assignee = Some(user_id.into());
        self
    }

    /// Sets the request timeout, kept at millisecond precision.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    /// Returns error if the webhook URL is not an absolute http(s) URL, the
    /// timeout is zero, or the default assignee is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.webhook_url).map_err(|e| {
            ConfigError::InvalidValue(format!("webhook_url {}: {}", self.webhook_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidValue(format!(
                "webhook_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(assignee) = &self.default_assignee
            && assignee.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "default_assignee cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed or validated.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.bitrix24.validate()?;
        Ok(config)
    }
}
