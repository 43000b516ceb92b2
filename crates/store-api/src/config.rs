//! Store API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `JWT_EXPIRES_IN` - Token lifetime, `<n>s|m|h|d` or bare seconds (default: 7d)
//! - `STORE_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string
//!   (in-memory repositories when unset)
//! - `STORE_HOST` - Bind address (default: 127.0.0.1)
//! - `STORE_PORT` - Listen port (default: 9000)
//! - `AUTH_LEGACY_SCAN_ENABLED` - Allow the paginated back-reference scan (default: true)
//! - `AUTH_SCAN_PAGE_SIZE` - Customers fetched per scan page (default: 100)
//! - `AUTH_LOOKUP_TIMEOUT_MS` - Timeout for each customer lookup (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default token lifetime (7 days).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Store API configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `PostgreSQL` connection URL; `None` selects in-memory repositories
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Customer resolution tuning
    pub auth: AuthLookupConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Token signing configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Lifetime of issued tokens
    pub expires_in: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Knobs for the customer resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthLookupConfig {
    /// Whether the paginated `auth_identity_id` scan may run
    pub legacy_scan_enabled: bool,
    /// Customers requested per scan page
    pub scan_page_size: usize,
    /// Upper bound on each individual lookup
    pub lookup_timeout: Duration,
}

impl Default for AuthLookupConfig {
    fn default() -> Self {
        Self {
            legacy_scan_enabled: true,
            scan_page_size: 100,
            lookup_timeout: Duration::from_millis(2000),
        }
    }
}

impl StoreConfig {
    /// Build a configuration with defaults for everything except signing.
    ///
    /// Used by tests and tools that do not read the environment.
    #[must_use]
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 9000,
            jwt,
            auth: AuthLookupConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the signing secret fails validation (length, placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STORE_DATABASE_URL");
        let host = get_env_or_default("STORE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("STORE_PORT", "9000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_PORT".to_string(), e.to_string()))?;

        let jwt = JwtConfig::from_env()?;
        let auth = AuthLookupConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt,
            auth,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    /// Create a signing configuration without validating the secret.
    #[must_use]
    pub fn new(secret: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_in,
        }
    }

    /// Load `JWT_SECRET` and `JWT_EXPIRES_IN`.
    ///
    /// There is no fallback secret: a missing or weak `JWT_SECRET` is a
    /// startup error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the secret is missing or insecure, or the
    /// lifetime cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;

        let expires_in = match get_optional_env("JWT_EXPIRES_IN") {
            Some(raw) => parse_duration(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("JWT_EXPIRES_IN".to_string(), e))?,
            None => DEFAULT_TOKEN_TTL,
        };

        Ok(Self { secret, expires_in })
    }
}

impl AuthLookupConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let legacy_scan_enabled = match get_optional_env("AUTH_LEGACY_SCAN_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "AUTH_LEGACY_SCAN_ENABLED".to_string(),
                    format!("expected true/false, got '{raw}'"),
                )
            })?,
            None => defaults.legacy_scan_enabled,
        };

        let scan_page_size = get_env_or_default("AUTH_SCAN_PAGE_SIZE", "100")
            .parse::<usize>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "AUTH_SCAN_PAGE_SIZE".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let lookup_timeout = get_env_or_default("AUTH_LOOKUP_TIMEOUT_MS", "2000")
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("AUTH_LOOKUP_TIMEOUT_MS".to_string(), e.to_string())
            })?;

        Ok(Self {
            legacy_scan_enabled,
            scan_page_size,
            lookup_timeout,
        })
    }
}

/// Database URL from `STORE_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Loads `.env` first. Used by tools that need the database but not the
/// rest of the server configuration.
#[must_use]
pub fn database_url_from_env() -> Option<SecretString> {
    let _ = dotenvy::dotenv();
    get_database_url("STORE_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s` or `3600`.
///
/// # Errors
///
/// Returns a description of the problem if the value is not a positive
/// amount with a known unit.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (digits, multiplier) = [('s', 1), ('m', 60), ('h', 60 * 60), ('d', 24 * 60 * 60)]
        .into_iter()
        .find_map(|(unit, secs)| raw.strip_suffix(unit).map(|digits| (digits, secs)))
        .unwrap_or((raw, 1));

    let amount = digits
        .parse::<u64>()
        .map_err(|_| format!("unrecognized duration '{raw}'"))?;
    if amount == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{raw}' is too large"))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
