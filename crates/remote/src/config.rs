use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} is empty")]
    Empty(&'static str),
    #[error("SUPABASE_URL is not a valid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("SUPABASE_URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),
    #[error("SUPABASE_TIMEOUT_SECS must be a positive integer, got '{0}'")]
    InvalidTimeout(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub supabase_url: Url,
    pub anon_key: SecretString,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(supabase_url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(supabase_url.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        // Url::join treats the last segment as a file unless it ends in '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let anon_key = anon_key.trim();
        if anon_key.is_empty() {
            return Err(ConfigError::Empty("SUPABASE_ANON_KEY"));
        }

        Ok(Self {
            supabase_url: url,
            anon_key: SecretString::from(anon_key.to_string()),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`: project URL, e.g. `https://xyz.supabase.co`
    /// - `SUPABASE_ANON_KEY`: public anon key
    ///
    /// Optional:
    /// - `SUPABASE_TIMEOUT_SECS`: per-request timeout (default 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        if url.trim().is_empty() {
            return Err(ConfigError::Empty("SUPABASE_URL"));
        }
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?;

        let mut config = Self::new(&url, &anon_key)?;

        if let Ok(raw) = std::env::var("SUPABASE_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `{project}/auth/v1/{path}`
    pub fn auth_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.supabase_url.join(&format!("auth/v1/{path}"))
    }

    /// `{project}/rest/v1/{path}`
    pub fn rest_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.supabase_url.join(&format!("rest/v1/{path}"))
    }

    pub(crate) fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }
}
