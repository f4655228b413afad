//! Client configuration.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Where the API lives and how pages are sized.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub page_size: u32,
    pub timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Zero is ignored; a page must hold at least one entry.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `SHELF_API_URL`, `SHELF_API_TOKEN`, `SHELF_PAGE_SIZE` and
    /// `SHELF_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns an error if the URL is unset or a numeric variable does not
    /// parse to a positive number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("SHELF_API_URL").ok_or(ConfigError::Missing("SHELF_API_URL"))?;
        let mut config = Self::new(&base_url);
        config.api_token = lookup("SHELF_API_TOKEN").filter(|t| !t.is_empty());
        if let Some(raw) = lookup("SHELF_PAGE_SIZE") {
            config.page_size = parse_positive("SHELF_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("SHELF_TIMEOUT_SECS") {
            let secs = parse_positive("SHELF_TIMEOUT_SECS", &raw)?;
            config.timeout = Duration::from_secs(u64::from(secs));
        }
        Ok(config)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}
