//! Database operations for the Shopforge `PostgreSQL` schema.
//!
//! # Schema: `shopforge`
//!
//! ## Tables
//!
//! - `users`, `api_tokens` - Callers and their hashed bearer tokens
//! - `stores` - Tenants; almost every other table is scoped by `store_id`
//! - `custom_domains` - Store domains with verification and SSL lifecycle
//! - `shipping_methods`, `product_labels`, `pdf_templates` - Store configuration
//! - `slot_configurations`, `slot_configuration_versions` - Page layouts and history
//! - `plugins`, `plugin_widgets`, `plugin_event_listeners`, `plugin_hooks`,
//!   `plugin_versions` - Plugin registry and source history
//! - `*_translations`, `*_seo` - Normalized per-language rows
//! - `jobs` - Background job status for polling clients
//! - `billing_events` - Processed Stripe webhook events
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopforge-cli -- migrate
//! ```

pub mod api_tokens;
pub mod billing;
pub mod custom_domains;
pub mod jobs;
pub mod pdf_templates;
pub mod plugin_versions;
pub mod plugins;
pub mod product_labels;
pub mod shipping_methods;
pub mod slot_configurations;
pub mod stores;
pub mod translations;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use api_tokens::ApiTokenRepository;
pub use billing::{AppliedEvent, BillingRepository};
pub use custom_domains::CustomDomainRepository;
pub use jobs::JobRepository;
pub use pdf_templates::PdfTemplateRepository;
pub use plugin_versions::PluginVersionRepository;
pub use plugins::PluginRepository;
pub use product_labels::ProductLabelRepository;
pub use shipping_methods::ShippingMethodRepository;
pub use slot_configurations::SlotConfigurationRepository;
pub use stores::StoreRepository;
pub use translations::TranslationRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Decode a JSONB column into a typed value.
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {what} in database: {e}")))
}

/// Encode a typed value for a JSONB column.
pub(crate) fn encode_json<T: serde::Serialize>(
    value: &T,
    what: &str,
) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode {what}: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    pool_options().connect(database_url.expose_secret()).await
}

/// Create a pool that connects on first use and keeps no idle connections.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    pool_options()
        .min_connections(0)
        .connect_lazy(database_url.expose_secret())
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
}
