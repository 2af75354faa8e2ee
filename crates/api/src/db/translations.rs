//! Execution of translation normalization against the database.

use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::translations::{NormalizationReport, NormalizationTarget, extract_rows};

use super::RepositoryError;

/// Source rows read per query.
const PAGE_SIZE: i64 = 500;

#[derive(Debug, sqlx::FromRow)]
struct BlobRow {
    id: i32,
    blob: Value,
}

/// Runs [`NormalizationTarget`]s against their tables.
pub struct TranslationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TranslationRepository<'a> {
    /// Create a new translation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Copy one target's blob column into its normalized table.
    ///
    /// Source rows are read a page at a time in id order. Runs in a single
    /// transaction; a `dry_run` rolls it back and reports
    /// what would have been inserted. Existing `(entity, language)` rows are
    /// left alone, so the operation is safe to repeat. Source columns are
    /// never modified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails. Malformed
    /// blobs are reported as warnings, not errors.
    pub async fn normalize(
        &self,
        target: &NormalizationTarget,
        dry_run: bool,
    ) -> Result<NormalizationReport, RepositoryError> {
        let mut report = NormalizationReport::new(target.name);
        let mut tx = self.pool.begin().await?;

        let select = target.select_statement();
        let insert = target.insert_statement();
        let mut last_id = 0;
        loop {
            let page = sqlx::query_as::<_, BlobRow>(&select)
                .bind(last_id)
                .bind(PAGE_SIZE)
                .fetch_all(&mut *tx)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            last_id = last.id;

            for row in page {
                report.entities_scanned += 1;

                let extracted = match extract_rows(row.id, &row.blob, target.fields) {
                    Ok(extracted) => extracted,
                    Err(e) => {
                        tracing::warn!(normalization = target.name, entity_id = row.id, error = %e, "Skipping blob");
                        report.warnings.push(e.to_string());
                        continue;
                    }
                };
                report.warnings.extend(extracted.warnings);

                for translation in extracted.rows {
                    let mut query = sqlx::query(&insert)
                        .bind(translation.entity_id)
                        .bind(translation.language.as_str());
                    for value in &translation.values {
                        query = query.bind(value.as_deref());
                    }
                    let result = query.execute(&mut *tx).await?;
                    report.record_insert(result.rows_affected());
                }
            }
        }

        if dry_run {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        tracing::info!(
            normalization = target.name,
            dry_run,
            scanned = report.entities_scanned,
            inserted = report.rows_inserted,
            skipped = report.rows_skipped,
            warnings = report.warnings.len(),
            "Normalized translations"
        );

        Ok(report)
    }
}
