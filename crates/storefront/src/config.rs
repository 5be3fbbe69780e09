//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults suit a local backend on port 8000.
//!
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (default: <http://localhost:3000>)
//! - `SOKO_API_URL` - Soko REST backend base URL (default: <http://localhost:8000/api/>)
//! - `SOKO_API_TIMEOUT_SECS` - Backend request timeout (default: 10)
//! - `SOKO_CURRENCY_LABEL` - Prefix for displayed prices (default: `Kshs.`)
//! - `SOKO_FEATURED_PRODUCTS` - Products shown on the home page (default: 4)
//! - `SOKO_CATEGORY_CACHE_TTL_SECS` - Category list cache lifetime (default: 300)
//! - `SOKO_SESSION_EXPIRY_SECS` - Session inactivity expiry (default: 7 days)
//! - `SOKO_SESSION_REVALIDATE_SECS` - Profile revalidation interval (default: 300)
//! - `SOKO_LOG_FORMAT` - `text` or `json` (default: text)
//! - `STOREFRONT_STATIC_DIR` - Static asset directory (default: the crate's `static/`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Storefront application configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Soko backend configuration
    pub api: ApiConfig,
    /// Presentation settings
    pub display: DisplayConfig,
    /// Session settings
    pub session: SessionConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("api", &self.api)
            .field("display", &self.display)
            .field("session", &self.session)
            .field("log_format", &self.log_format)
            .field("static_dir", &self.static_dir)
            .field(
                "sentry_dsn",
                &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

/// Soko REST backend configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; always ends with `/` so relative endpoints join under it
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Category cache time-to-live
    pub category_cache_ttl: Duration,
}

/// Presentation settings.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Prefix shown before prices (e.g. `Kshs.`)
    pub currency_label: String,
    /// Number of products on the home page
    pub featured_products: usize,
}

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity expiry
    pub expiry: Duration,
    /// How long a fetched profile is trusted before it is revalidated
    pub revalidate_after: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api = ApiConfig {
            base_url: parse_api_url(&env.or_default("SOKO_API_URL", "http://localhost:8000/api/"))?,
            timeout: Duration::from_secs(env.parse_or("SOKO_API_TIMEOUT_SECS", 10)?),
            category_cache_ttl: Duration::from_secs(
                env.parse_or("SOKO_CATEGORY_CACHE_TTL_SECS", 300)?,
            ),
        };

        let display = DisplayConfig {
            currency_label: env.or_default("SOKO_CURRENCY_LABEL", "Kshs."),
            featured_products: env.parse_or("SOKO_FEATURED_PRODUCTS", 4)?,
        };

        let session = SessionConfig {
            expiry: Duration::from_secs(env.parse_or("SOKO_SESSION_EXPIRY_SECS", 7 * 24 * 60 * 60)?),
            revalidate_after: Duration::from_secs(
                env.parse_or("SOKO_SESSION_REVALIDATE_SECS", 300)?,
            ),
        };

        Ok(Self {
            host: env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("STOREFRONT_PORT", 3000)?,
            base_url: env.or_default("STOREFRONT_BASE_URL", "http://localhost:3000"),
            api,
            display,
            session,
            log_format: env.parse_or("SOKO_LOG_FORMAT", LogFormat::Text)?,
            static_dir: env.get("STOREFRONT_STATIC_DIR").map_or_else(
                || PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
                PathBuf::from,
            ),
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }
}

/// Parse the backend URL, forcing a trailing slash so `Url::join` keeps the
/// `/api/` prefix.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("SOKO_API_URL".to_string(), msg);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.api.base_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert_eq!(config.display.currency_label, "Kshs.");
        assert_eq!(config.display.featured_products, 4);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_api_url_gets_trailing_slash() {
        let config = load(&[("SOKO_API_URL", "https://shop.example.com/api")]).unwrap();
        assert_eq!(config.api.base_url.as_str(), "https://shop.example.com/api/");
        assert_eq!(
            config.api.base_url.join("products/").unwrap().as_str(),
            "https://shop.example.com/api/products/"
        );
    }

    #[test]
    fn test_api_url_rejects_other_schemes() {
        let err = load(&[("SOKO_API_URL", "ftp://example.com/api/")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SOKO_API_URL"));
        assert!(load(&[("SOKO_API_URL", "not a url")]).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("STOREFRONT_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "STOREFRONT_PORT"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("STOREFRONT_PORT", "  "), ("SOKO_CURRENCY_LABEL", "")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.display.currency_label, "Kshs.");
    }

    #[test]
    fn test_log_format() {
        assert_eq!(load(&[("SOKO_LOG_FORMAT", "JSON")]).unwrap().log_format, LogFormat::Json);
        assert!(load(&[("SOKO_LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_debug_redacts_sentry_dsn() {
        let config = load(&[("SENTRY_DSN", "https://key@sentry.example.com/1")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("key@sentry"));
    }

    #[test]
    fn test_https_base_url_is_secure() {
        let config = load(&[("STOREFRONT_BASE_URL", "https://soko.example.com")]).unwrap();
        assert!(config.is_secure());
    }
}
