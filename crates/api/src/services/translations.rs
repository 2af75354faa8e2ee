//! Translation normalization across targets.

use sqlx::PgPool;

use shopforge_core::translations::{
    self, NormalizationReport, NormalizationTarget, TARGETS, TranslationError,
};

use crate::db::{RepositoryError, TranslationRepository};

/// The named target, or every target when `name` is `None`.
///
/// # Errors
///
/// Returns `TranslationError::UnknownTarget` for an unknown name.
pub fn select_targets(
    name: Option<&str>,
) -> Result<Vec<&'static NormalizationTarget>, TranslationError> {
    match name {
        Some(name) => Ok(vec![translations::target(name)?]),
        None => Ok(TARGETS.iter().collect()),
    }
}

/// Normalize `targets` one after another.
///
/// Each target runs in its own transaction, so a failure leaves earlier
/// targets committed. Reruns are harmless.
///
/// # Errors
///
/// Returns `RepositoryError` from the first target that fails.
pub async fn normalize(
    pool: &PgPool,
    targets: &[&'static NormalizationTarget],
    dry_run: bool,
) -> Result<Vec<NormalizationReport>, RepositoryError> {
    let repo = TranslationRepository::new(pool);
    let mut reports = Vec::with_capacity(targets.len());
    for target in targets {
        reports.push(repo.normalize(target, dry_run).await?);
    }
    Ok(reports)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_select_targets() {
        assert_eq!(select_targets(None).unwrap().len(), TARGETS.len());

        let one = select_targets(Some("product_seo")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].target_table, "product_seo");

        assert!(matches!(
            select_targets(Some("orders")),
            Err(TranslationError::UnknownTarget(_))
        ));
    }
}
