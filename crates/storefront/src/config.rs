//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BYTEBAZAAR_BACKEND_URL` - Base URL of the storefront backend
//! - `BYTEBAZAAR_ORIGIN` - Public origin of the site, used in checkout redirect URLs
//!
//! ## Optional
//! - `BYTEBAZAAR_API_TOKEN` - Bearer token identifying the caller to the backend
//! - `BYTEBAZAAR_CURRENCY` - Checkout currency (default: INR)
//! - `BYTEBAZAAR_CACHE_TTL_SECS` - Query cache time-to-live (default: 300)
//! - `BYTEBAZAAR_CACHE_CAPACITY` - Query cache entry limit (default: 1000)
//! - `BYTEBAZAAR_REQUEST_TIMEOUT_SECS` - Backend request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use bytebazaar_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Query layer and checkout settings
    pub store: StoreOptions,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL of the backend (RPC calls go to `{base_url}/rpc/{method}`)
    pub base_url: Url,
    /// Bearer token for the calling identity
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Settings for the query layer and checkout flow.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Public origin of the site (scheme + host + port)
    pub origin: Url,
    /// Currency sent to the payment processor
    pub currency: CurrencyCode,
    /// Query cache settings
    pub cache: CacheConfig,
}

impl StoreOptions {
    /// Options with default currency and cache settings.
    #[must_use]
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            currency: CurrencyCode::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Query cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Time-to-live for cached reads
    pub ttl: Duration,
    /// Maximum number of cached entries
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300), // 5 minutes
            max_capacity: 1000,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig::from_env()?;
        let store = StoreOptions::from_env()?;

        Ok(Self {
            backend,
            store,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_url("BYTEBAZAAR_BACKEND_URL")?;
        let api_token = get_optional_env("BYTEBAZAAR_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "BYTEBAZAAR_API_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;
        let request_timeout =
            Duration::from_secs(get_parsed_or_default("BYTEBAZAAR_REQUEST_TIMEOUT_SECS", 30)?);

        Ok(Self {
            base_url,
            api_token,
            request_timeout,
        })
    }

    /// Bearer token value, if configured.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_token.as_ref().map(|token| token.expose_secret())
    }
}

impl StoreOptions {
    fn from_env() -> Result<Self, ConfigError> {
        let origin = get_url("BYTEBAZAAR_ORIGIN")?;
        let currency = get_env_or_default("BYTEBAZAAR_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BYTEBAZAAR_CURRENCY".to_string(), e.to_string())
            })?;
        let cache = CacheConfig {
            ttl: Duration::from_secs(get_parsed_or_default("BYTEBAZAAR_CACHE_TTL_SECS", 300)?),
            max_capacity: get_parsed_or_default("BYTEBAZAAR_CACHE_CAPACITY", 1000)?,
        };

        Ok(Self {
            origin,
            currency,
            cache,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional numeric environment variable, falling back to a default.
fn get_parsed_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get a required environment variable holding an absolute http(s) URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    parse_http_url(&get_required_env(key)?, key)
}

/// Parse an absolute http(s) URL with a host.
fn parse_http_url(value: &str, var_name: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real tokens have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_http_url() {
        let url = parse_http_url("https://shop.example.com", "TEST_URL").unwrap();
        assert_eq!(url.host_str(), Some("shop.example.com"));

        assert!(parse_http_url("ftp://shop.example.com", "TEST_URL").is_err());
        assert!(parse_http_url("/relative/path", "TEST_URL").is_err());
    }

    #[test]
    fn test_store_options_defaults() {
        let options = StoreOptions::new(Url::parse("https://shop.example.com").unwrap());
        assert_eq!(options.currency, CurrencyCode::INR);
        assert_eq!(options.cache.ttl, Duration::from_secs(300));
        assert_eq!(options.cache.max_capacity, 1000);
    }

    #[test]
    fn test_backend_config_debug_redacts_token() {
        let config = BackendConfig {
            base_url: Url::parse("https://api.example.com").unwrap(),
            api_token: Some(SecretString::from("super_secret_token_value")),
            request_timeout: Duration::from_secs(30),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token_value"));
        assert_eq!(config.bearer_token(), Some("super_secret_token_value"));
    }
}
