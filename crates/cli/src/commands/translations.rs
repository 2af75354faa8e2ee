//! Translation normalization commands.

use shopforge_api::services::translations::{normalize as normalize_targets, select_targets};
use shopforge_core::translations::TARGETS;

use super::{CommandError, connect, database_url};

/// Normalize one target or all of them, logging a report per target.
///
/// # Errors
///
/// Returns an error for an unknown target or a failed database write.
pub async fn normalize(target: Option<&str>, dry_run: bool) -> Result<(), CommandError> {
    let targets =
        select_targets(target).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let pool = connect(&database_url()?).await?;

    if dry_run {
        tracing::info!("Dry run: nothing will be written");
    }

    let reports = normalize_targets(&pool, &targets, dry_run).await?;
    for report in &reports {
        tracing::info!(
            target = %report.target,
            scanned = report.entities_scanned,
            inserted = report.rows_inserted,
            skipped = report.rows_skipped,
            "Target normalized"
        );
        for warning in &report.warnings {
            tracing::warn!(target = %report.target, "{warning}");
        }
    }
    Ok(())
}

/// Print every normalization target.
pub fn targets() {
    #[allow(clippy::print_stdout)]
    for target in TARGETS {
        println!(
            "{:<28} {}.{} -> {}",
            target.name, target.source_table, target.source_column, target.target_table
        );
    }
}
