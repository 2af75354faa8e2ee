//! Page layout repository with snapshot/patch history.
//!
//! `slot_configurations` holds the current tree of each (store, page type);
//! `slot_configuration_versions` holds every saved version, as a full
//! snapshot every `interval` versions and as a patch against the previous
//! version otherwise.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;

use shopforge_core::history::{self, SnapshotPolicy, StoredVersion, VersionKind};
use shopforge_core::slots::{Slot, SlotConfiguration, SlotId};
use shopforge_core::{StoreId, UserId};

use super::{RepositoryError, conflict_on_unique, decode_json, encode_json};
use crate::models::{LayoutRecord, LayoutVersion};

#[derive(Debug, sqlx::FromRow)]
struct LayoutRow {
    page_type: String,
    slots: Value,
    metadata: Value,
    version: i32,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LayoutRow> for LayoutRecord {
    type Error = RepositoryError;

    fn try_from(row: LayoutRow) -> Result<Self, Self::Error> {
        let slots: BTreeMap<SlotId, Slot> = decode_json(row.slots, "slot tree")?;
        let metadata: Map<String, Value> = decode_json(row.metadata, "layout metadata")?;

        Ok(Self {
            configuration: SlotConfiguration {
                page_type: row.page_type,
                slots,
                metadata,
            },
            version: row.version,
            updated_at: Some(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    version: i32,
    kind: VersionKind,
    payload: Value,
}

impl From<VersionRow> for StoredVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            number: row.version,
            kind: row.kind,
            payload: row.payload,
        }
    }
}

const CONCURRENT_SAVE: &str = "layout was saved concurrently; reload and retry";

/// A save made against `expected` may only proceed while the page is still at
/// that version (0 for a page never saved).
fn check_expected_version(current: i32, expected: Option<i32>) -> Result<(), RepositoryError> {
    match expected {
        Some(expected) if expected != current => Err(RepositoryError::Conflict(format!(
            "layout is at version {current}, not {expected}; reload and retry"
        ))),
        _ => Ok(()),
    }
}

/// Repository for page layouts and their history.
pub struct SlotConfigurationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SlotConfigurationRepository<'a> {
    /// Create a new slot configuration repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The current layout of a page, or `None` if it was never saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the stored tree is corrupt.
    pub async fn get(
        &self,
        store_id: StoreId,
        page_type: &str,
    ) -> Result<Option<LayoutRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, LayoutRow>(
            r"
            SELECT page_type, slots, metadata, version, updated_at
            FROM shopforge.slot_configurations
            WHERE store_id = $1 AND page_type = $2
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Save a layout as the next version.
    ///
    /// The current row is locked for the duration of the transaction, so
    /// saves of one page are serialized. Two first saves racing on a page
    /// with no row yet both try to insert version 1; the loser gets
    /// `RepositoryError::Conflict`.
    ///
    /// With `expected_version` set, the save only proceeds if the stored
    /// version (0 for a page never saved) still matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a concurrent or stale save, or
    /// `RepositoryError::Database` if a statement fails.
    pub async fn save(
        &self,
        store_id: StoreId,
        configuration: &SlotConfiguration,
        policy: SnapshotPolicy,
        created_by: Option<UserId>,
        expected_version: Option<i32>,
    ) -> Result<LayoutRecord, RepositoryError> {
        let page_type = configuration.page_type.as_str();
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, LayoutRow>(
            r"
            SELECT page_type, slots, metadata, version, updated_at
            FROM shopforge.slot_configurations
            WHERE store_id = $1 AND page_type = $2
            FOR UPDATE
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .fetch_optional(&mut *tx)
        .await?;

        let (number, previous) = match current {
            Some(row) => {
                let record = LayoutRecord::try_from(row)?;
                (record.version + 1, Some(record.configuration.to_document()))
            }
            None => (1, None),
        };

        check_expected_version(number - 1, expected_version)?;

        let stored = history::next_version(
            policy,
            number,
            previous.as_ref(),
            &configuration.to_document(),
        );

        sqlx::query(
            r"
            INSERT INTO shopforge.slot_configuration_versions
                (store_id, page_type, version, kind, payload, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .bind(stored.number)
        .bind(stored.kind)
        .bind(&stored.payload)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, CONCURRENT_SAVE))?;

        let row = sqlx::query_as::<_, LayoutRow>(
            r"
            INSERT INTO shopforge.slot_configurations (store_id, page_type, slots, metadata, version)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (store_id, page_type) DO UPDATE
            SET slots = EXCLUDED.slots,
                metadata = EXCLUDED.metadata,
                version = EXCLUDED.version,
                updated_at = NOW()
            RETURNING page_type, slots, metadata, version, updated_at
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .bind(encode_json(&configuration.slots, "slot tree")?)
        .bind(Value::Object(configuration.metadata.clone()))
        .bind(number)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            store_id = %store_id,
            page_type,
            version = number,
            kind = ?stored.kind,
            "Saved layout version"
        );

        row.try_into()
    }

    /// Version headers of a page, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_versions(
        &self,
        store_id: StoreId,
        page_type: &str,
    ) -> Result<Vec<LayoutVersion>, RepositoryError> {
        let versions = sqlx::query_as::<_, LayoutVersion>(
            r"
            SELECT version, kind, created_by, created_at
            FROM shopforge.slot_configuration_versions
            WHERE store_id = $1 AND page_type = $2
            ORDER BY version DESC
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .fetch_all(self.pool)
        .await?;

        Ok(versions)
    }

    /// Every stored version up to and including `up_to`, for reconstruction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_versions(
        &self,
        store_id: StoreId,
        page_type: &str,
        up_to: i32,
    ) -> Result<Vec<StoredVersion>, RepositoryError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r"
            SELECT version, kind, payload
            FROM shopforge.slot_configuration_versions
            WHERE store_id = $1 AND page_type = $2 AND version <= $3
              AND version >= COALESCE((
                  SELECT MAX(version)
                  FROM shopforge.slot_configuration_versions
                  WHERE store_id = $1 AND page_type = $2 AND version <= $3 AND kind = 'snapshot'
              ), 1)
            ORDER BY version
            ",
        )
        .bind(store_id)
        .bind(page_type)
        .bind(up_to)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_version_must_match() {
        assert!(check_expected_version(0, None).is_ok());
        assert!(check_expected_version(4, None).is_ok());
        assert!(check_expected_version(0, Some(0)).is_ok());
        assert!(check_expected_version(4, Some(4)).is_ok());

        assert!(matches!(
            check_expected_version(4, Some(3)),
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            check_expected_version(0, Some(1)),
            Err(RepositoryError::Conflict(_))
        ));
    }
}
