//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MOOGSHIP_API_URL` - Base URL of the MoogShip API
//!
//! ## Optional
//! - `MOOGSHIP_SESSION_COOKIE` - Session cookie sent with every request
//! - `MOOGSHIP_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `MOOGSHIP_STALE_TIME_SECS` - How long a cached query stays fresh (default: 30)
//! - `MOOGSHIP_CACHE_CAPACITY` - Maximum number of cached queries (default: 1000)
//! - `MOOGSHIP_CACHE_IDLE_SECS` - Idle time before a cached query is evicted (default: 300)
//! - `MOOGSHIP_TRACKING_POLL_SECS` - Tracking view refresh interval (default: 60)
//! - `MOOGSHIP_STATE_DIR` - Directory for client-persisted state (default: .moogship)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL, always ending in `/`
    pub api_url: Url,
    /// Session cookie value (`connect.sid=...`)
    pub session_cookie: Option<SecretString>,
    pub request_timeout: Duration,
    /// Default freshness window for cached queries
    pub stale_time: Duration,
    pub cache_capacity: u64,
    /// Cached queries nobody reads for this long are evicted
    pub cache_idle: Duration,
    /// Refetch interval for tracking views
    pub tracking_poll: Duration,
    /// Directory holding the persisted bulk selection
    pub state_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("stale_time", &self.stale_time)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_idle", &self.cache_idle)
            .field("tracking_poll", &self.tracking_poll)
            .field("state_dir", &self.state_dir)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute URL.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_base_url(api_url)?,
            session_cookie: None,
            request_timeout: Duration::from_secs(30),
            stale_time: Duration::from_secs(30),
            cache_capacity: 1000,
            cache_idle: Duration::from_secs(300),
            tracking_poll: Duration::from_secs(60),
            state_dir: PathBuf::from(".moogship"),
            sentry_dsn: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        let mut config = Self::new(&env.required("MOOGSHIP_API_URL")?)?;

        config.session_cookie = env.optional("MOOGSHIP_SESSION_COOKIE").map(SecretString::from);
        config.request_timeout = env.secs("MOOGSHIP_REQUEST_TIMEOUT_SECS", 30)?;
        config.stale_time = env.secs("MOOGSHIP_STALE_TIME_SECS", 30)?;
        config.cache_capacity = env.parsed("MOOGSHIP_CACHE_CAPACITY", 1000)?;
        config.cache_idle = env.secs("MOOGSHIP_CACHE_IDLE_SECS", 300)?;
        config.tracking_poll = env.secs("MOOGSHIP_TRACKING_POLL_SECS", 60)?;
        if config.tracking_poll.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "MOOGSHIP_TRACKING_POLL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = env.optional("MOOGSHIP_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        config.sentry_dsn = env.optional("SENTRY_DSN");

        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("MOOGSHIP_API_URL".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "MOOGSHIP_API_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    // Url::join replaces the last segment unless the path ends in '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required environment variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional environment variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a parsed environment variable with a default value.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    fn secs(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.parsed(key, default).map(Duration::from_secs)
    }
}
