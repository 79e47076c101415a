//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_TOKEN_SECRET` - Bearer-token signing key (min 32 chars, high entropy)
//! - `BAZAAR_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; not needed with `BAZAAR_STORAGE=memory`)
//!
//! ## Optional
//! - `BAZAAR_STORAGE` - `postgres` or `memory` (default: postgres)
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 5000)
//! - `BAZAAR_TOKEN_TTL` - Token lifetime, e.g. `30d`, `12h`, `3600` (default: 30d)
//! - `BAZAAR_RESET_TOKEN_TTL` - Password-reset token lifetime (default: 10m)
//! - `BAZAAR_EMPTY_ORDERS_NOT_FOUND` - Answer an empty order list with 404 (default: true)
//! - `BAZAAR_LOG_JSON` - JSON log output (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Which persistence backend the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

/// API application configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ApiConfig {
    pub storage: StorageBackend,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer-token signing key
    pub token_secret: SecretString,
    pub token_ttl: Duration,
    pub reset_token_ttl: Duration,
    /// Preserve the 404 answer for an empty order list
    pub empty_orders_not_found: bool,
    pub log_json: bool,
    pub sentry: SentryConfig,
}

/// Error tracking settings.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("storage", &self.storage)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("empty_orders_not_found", &self.empty_orders_not_found)
            .field("log_json", &self.log_json)
            .field("sentry", &self.sentry)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key/value source.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let storage = env.parse_or("BAZAAR_STORAGE", StorageBackend::Postgres)?;
        let database_url = env
            .get("BAZAAR_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from);
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("BAZAAR_DATABASE_URL".to_string()));
        }

        let token_secret = SecretString::from(env.required("BAZAAR_TOKEN_SECRET")?);
        validate_token_secret(&token_secret, "BAZAAR_TOKEN_SECRET")?;
        validate_secret_strength(token_secret.expose_secret(), "BAZAAR_TOKEN_SECRET")?;

        Ok(Self {
            storage,
            database_url,
            host: env.parse_or("BAZAAR_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("BAZAAR_PORT", 5000)?,
            token_secret,
            token_ttl: env.duration_or("BAZAAR_TOKEN_TTL", Duration::from_secs(30 * 86_400))?,
            reset_token_ttl: env.duration_or("BAZAAR_RESET_TOKEN_TTL", Duration::from_secs(600))?,
            empty_orders_not_found: env.bool_or("BAZAAR_EMPTY_ORDERS_NOT_FOUND", true)?,
            log_json: env.bool_or("BAZAAR_LOG_JSON", false)?,
            sentry: SentryConfig {
                dsn: env.get("SENTRY_DSN"),
                environment: env.get("SENTRY_ENVIRONMENT"),
                sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
                traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
            },
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Typed access to a key/value source. Blank values count as unset.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    format!("expected a boolean, got '{other}'"),
                )),
            }
        })
    }

    fn duration_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            parse_duration(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
        })
    }
}

/// Parse `<n>s`, `<n>m`, `<n>h`, `<n>d`, or a plain number of seconds.
fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (digits, unit_secs) = match value.char_indices().last() {
        Some((i, 's')) => (value.get(..i), 1),
        Some((i, 'm')) => (value.get(..i), 60),
        Some((i, 'h')) => (value.get(..i), 3_600),
        Some((i, 'd')) => (value.get(..i), 86_400),
        Some(_) => (Some(value), 1),
        None => return Err("empty duration".to_string()),
    };

    let amount: u64 = digits
        .unwrap_or_default()
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;
    if amount == 0 {
        return Err("duration must be positive".to_string());
    }
    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{value}' is too large"))
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
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
