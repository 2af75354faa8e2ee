//! Custom domain maintenance.

use shopforge_api::services::{DohResolver, domain_verification::sweep_pending};

use super::{CommandError, api_config, connect};

/// Re-check every pending domain once.
///
/// # Errors
///
/// Returns an error if the pending list cannot be loaded. Failed lookups
/// for single domains are only counted.
pub async fn sweep() -> Result<(), CommandError> {
    let config = api_config()?;
    let resolver = DohResolver::new(&config.dns_resolver_url)?;
    let pool = connect(&config.database_url).await?;

    let report = sweep_pending(&pool, &resolver).await?;

    tracing::info!(
        "Checked {}: {} verified, {} failed, {} still pending, {} errors",
        report.checked,
        report.verified,
        report.failed,
        report.still_pending,
        report.errors
    );
    Ok(())
}
