//! Command implementations.

pub mod domains;
pub mod migrate;
pub mod token;
pub mod translations;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use shopforge_api::config::{ApiConfig, ConfigError};
use shopforge_api::db::{self, RepositoryError};
use shopforge_api::services::VerificationError;
use shopforge_api::services::tokens::TokenError;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The API configuration failed to load.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Domain verification could not run.
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Repository operation failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// A token could not be issued.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Database URL from `SHOPFORGE_DATABASE_URL` or `DATABASE_URL`.
///
/// Commands that only touch the database use this so they run without the
/// server's secrets.
pub(crate) fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();
    std::env::var("SHOPFORGE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("SHOPFORGE_DATABASE_URL"))
}

pub(crate) async fn connect(database_url: &SecretString) -> Result<PgPool, CommandError> {
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(database_url).await?)
}

/// Full server configuration, for commands that need the pepper or resolver.
pub(crate) fn api_config() -> Result<ApiConfig, CommandError> {
    Ok(ApiConfig::from_env()?)
}
