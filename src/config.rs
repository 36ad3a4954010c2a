use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `None` means no remote backend is configured.
    pub base_url: Option<Url>,
    pub timeout: Duration,
    /// Artificial delay for the local heuristic.
    pub heuristic_latency: Duration,
    pub seed: Option<u64>,
}

impl ClientConfig {
    pub fn remote(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Some(parse_base_url(base_url)?),
            ..Self::offline()
        })
    }

    pub fn offline() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            heuristic_latency: Duration::ZERO,
            seed: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_heuristic_latency(mut self, latency: Duration) -> Self {
        self.heuristic_latency = latency;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn http_client(&self) -> Result<Client, ConfigError> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("completion-risk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::HttpClient)
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(trimmed.to_string())),
    }
}

/// Joins `path` under the base URL, keeping any path prefix the base has.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(path.trim_start_matches('/'))
        .map_err(|err| ConfigError::InvalidBaseUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })
}
