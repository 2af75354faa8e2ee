//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFORGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPFORGE_BASE_URL` - Public URL of the API
//! - `SHOPFORGE_TOKEN_PEPPER` - Secret mixed into API token hashes (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOPFORGE_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFORGE_PORT` - Listen port (default: 3000)
//! - `STRIPE_WEBHOOK_SECRET` - Stripe signing secret; the webhook route is disabled without it
//! - `DNS_RESOLVER_URL` - DNS-over-HTTPS JSON endpoint (default: Cloudflare)
//! - `SLOT_SNAPSHOT_INTERVAL` - Layout versions per full snapshot (default: 10)
//! - `PLUGIN_SNAPSHOT_INTERVAL` - Plugin versions per full snapshot (default: 10)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use shopforge_core::history::SnapshotPolicy;

const MIN_PEPPER_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_DNS_RESOLVER_URL: &str = "https://cloudflare-dns.com/dns-query";

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

/// API server configuration.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Pepper prepended to API tokens before hashing
    pub token_pepper: SecretString,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<SecretString>,
    /// DNS-over-HTTPS endpoint used for domain verification
    pub dns_resolver_url: String,
    /// Snapshot cadence for layout history
    pub slot_snapshots: SnapshotPolicy,
    /// Snapshot cadence for plugin history
    pub plugin_snapshots: SnapshotPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs
    pub log_json: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("token_pepper", &"[REDACTED]")
            .field(
                "stripe_webhook_secret",
                &self.stripe_webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("dns_resolver_url", &self.dns_resolver_url)
            .field("slot_snapshots", &self.slot_snapshots)
            .field("plugin_snapshots", &self.plugin_snapshots)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .field("log_json", &self.log_json)
            .finish_non_exhaustive()
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

        let database_url = get_database_url("SHOPFORGE_DATABASE_URL")?;
        let host = get_env_or_default("SHOPFORGE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFORGE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHOPFORGE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFORGE_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("SHOPFORGE_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFORGE_BASE_URL".to_string(), e.to_string())
        })?;

        let token_pepper = get_validated_secret("SHOPFORGE_TOKEN_PEPPER")?;
        validate_min_length(&token_pepper, "SHOPFORGE_TOKEN_PEPPER")?;

        let stripe_webhook_secret = get_optional_env("STRIPE_WEBHOOK_SECRET").map(|secret| {
            if let Err(e) = validate_secret_strength(&secret, "STRIPE_WEBHOOK_SECRET") {
                tracing::warn!("STRIPE_WEBHOOK_SECRET validation warning: {e}");
            }
            SecretString::from(secret)
        });

        let dns_resolver_url = get_env_or_default("DNS_RESOLVER_URL", DEFAULT_DNS_RESOLVER_URL);
        let slot_snapshots = SnapshotPolicy::new(get_interval("SLOT_SNAPSHOT_INTERVAL")?);
        let plugin_snapshots = SnapshotPolicy::new(get_interval("PLUGIN_SNAPSHOT_INTERVAL")?);

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let log_json = get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            token_pepper,
            stripe_webhook_secret,
            dns_resolver_url,
            slot_snapshots,
            plugin_snapshots,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_json,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// A configuration for tests and tools that never touch the environment.
    #[must_use]
    pub fn for_tests(database_url: &str) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            token_pepper: SecretString::from("kV9#qL2$wX7!mR4@tY8&nB3*hJ6^zP1%".to_string()),
            stripe_webhook_secret: None,
            dns_resolver_url: DEFAULT_DNS_RESOLVER_URL.to_string(),
            slot_snapshots: SnapshotPolicy::default(),
            plugin_snapshots: SnapshotPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
            log_json: false,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a snapshot interval; zero is rejected.
fn get_interval(key: &str) -> Result<u32, ConfigError> {
    let value = get_env_or_default(key, "10")
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

/// Validate that a secret meets minimum length requirements.
fn validate_min_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_PEPPER_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_PEPPER_LENGTH,
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
