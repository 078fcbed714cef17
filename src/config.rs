//! Client configuration.
//!
//! A [`ClientConfig`] is built once and handed to the client, which never
//! changes it afterwards. It can be assembled in code, read from the
//! environment, or loaded from a TOML file:
//!
//! ```toml
//! base_url = "https://app.vbase.com/api/v1/"
//! api_key = "..."        # falls back to VBASE_API_KEY
//! timeout_secs = 30
//!
//! [retry]
//! max_retries = 3
//! min_delay_ms = 500
//! max_delay_ms = 10000
//! ```

use serde::Deserialize;
use std::{fmt, path::Path, time::Duration};
use thiserror::Error;
use url::Url;

use crate::api::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://app.vbase.com/api/v1/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "VBASE_API_URL";
pub const ENV_API_KEY: &str = "VBASE_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "VBASE_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0} is not set")]
    MissingVar(&'static str),

    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Connection settings shared by every request of a client.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    api_key: String,
    timeout: Duration,
    user_agent: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    retry: Option<RetryPolicy>,
}

impl ClientConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reads `VBASE_API_URL` (optional), `VBASE_API_KEY` (required) and
    /// `VBASE_TIMEOUT_SECS` (optional).
    ///
    /// # Errors
    ///
    /// Fails if the API key is missing or a variable can't be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = lookup(ENV_API_KEY).ok_or(ConfigError::MissingVar(ENV_API_KEY))?;

        let mut config = Self::new(Url::parse(&base_url)?, api_key);
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout {
                    name: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Loads a TOML configuration file. A key missing from the file is taken
    /// from `VBASE_API_KEY`.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read or parsed, or no API key is found.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents, |name| std::env::var(name).ok())
    }

    fn from_toml(
        contents: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(contents)?;

        let base_url = file
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = file
            .api_key
            .or_else(|| lookup(ENV_API_KEY))
            .ok_or(ConfigError::MissingVar(ENV_API_KEY))?;

        let mut config = Self::new(Url::parse(&base_url)?, api_key);
        if let Some(secs) = file.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = file.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(retry) = file.retry {
            config.retry = retry;
        }

        Ok(config)
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish()
    }
}
