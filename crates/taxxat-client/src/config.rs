use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config_env::{optional_trimmed_env, parse_u64_env};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SESSION_DIR: &str = ".taxxat";
pub const DEFAULT_RESET_REDIRECT_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub session_dir: PathBuf,
    pub reset_redirect_delay_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            reset_redirect_delay_ms: DEFAULT_RESET_REDIRECT_DELAY_MS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url =
            optional_trimmed_env("TAXXAT_API_URL").unwrap_or(defaults.api_base_url);
        let session_dir = optional_trimmed_env("TAXXAT_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_dir);
        let reset_redirect_delay_ms = parse_u64_env(
            "TAXXAT_RESET_REDIRECT_DELAY_MS",
            defaults.reset_redirect_delay_ms,
        )?;

        let config = Self {
            api_base_url,
            session_dir,
            reset_redirect_delay_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn with_session_dir(mut self, session_dir: impl Into<PathBuf>) -> Self {
        self.session_dir = session_dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.api_base_url).map_err(|err| {
            ConfigError::InvalidConfiguration(format!(
                "TAXXAT_API_URL is not a valid url '{}': {err}",
                self.api_base_url
            ))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidConfiguration(
                "TAXXAT_API_URL must start with http:// or https://".to_string(),
            ));
        }
        if self.session_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "TAXXAT_SESSION_DIR must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reset_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.reset_redirect_delay_ms)
    }
}
