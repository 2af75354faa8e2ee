//! Database migration command.
//!
//! Applies `crates/api/migrations/`, the only migration path. The server
//! never migrates on startup.

use super::{CommandError, connect, database_url};

/// Run pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect(&database_url()?).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
