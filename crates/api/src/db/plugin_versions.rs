//! Plugin source history.

use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::history::{self, Document, SnapshotPolicy, StoredVersion, VersionKind};
use shopforge_core::{PluginId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::PluginVersionHeader;

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    version_number: i32,
    kind: VersionKind,
    payload: Value,
}

impl From<VersionRow> for StoredVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            number: row.version_number,
            kind: row.kind,
            payload: row.payload,
        }
    }
}

const HEADER_COLUMNS: &str =
    "id, plugin_id, version_number, kind, message, tag, created_by, created_at";

/// Versions from the latest snapshot at or below `$2` up to `$2`.
const RECONSTRUCTION_QUERY: &str = r"
    SELECT version_number, kind, payload
    FROM shopforge.plugin_versions
    WHERE plugin_id = $1 AND version_number <= $2
      AND version_number >= COALESCE((
          SELECT MAX(version_number)
          FROM shopforge.plugin_versions
          WHERE plugin_id = $1 AND version_number <= $2 AND kind = 'snapshot'
      ), 1)
    ORDER BY version_number
";

/// Repository for plugin versions.
pub struct PluginVersionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PluginVersionRepository<'a> {
    /// Create a new plugin version repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Version headers of a plugin, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, plugin_id: PluginId) -> Result<Vec<PluginVersionHeader>, RepositoryError> {
        let headers = sqlx::query_as::<_, PluginVersionHeader>(&format!(
            r"
            SELECT {HEADER_COLUMNS}
            FROM shopforge.plugin_versions
            WHERE plugin_id = $1
            ORDER BY version_number DESC
            "
        ))
        .bind(plugin_id)
        .fetch_all(self.pool)
        .await?;

        Ok(headers)
    }

    /// Record `current` as the plugin's next version.
    ///
    /// The plugin row is locked for the duration, so commits of one plugin
    /// are numbered without gaps.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the plugin does not exist,
    /// `RepositoryError::DataCorruption` if the stored history cannot be
    /// replayed, or `RepositoryError::Conflict` on a concurrent commit.
    pub async fn commit(
        &self,
        plugin_id: PluginId,
        current: &Document,
        policy: SnapshotPolicy,
        message: Option<&str>,
        created_by: Option<UserId>,
    ) -> Result<PluginVersionHeader, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM shopforge.plugins WHERE id = $1 FOR UPDATE")
            .bind(plugin_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let latest: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version_number) FROM shopforge.plugin_versions WHERE plugin_id = $1",
        )
        .bind(plugin_id)
        .fetch_one(&mut *tx)
        .await?;

        let number = latest.unwrap_or(0) + 1;
        let previous = match latest {
            Some(latest) if !policy.is_snapshot(number) => {
                let rows = sqlx::query_as::<_, VersionRow>(RECONSTRUCTION_QUERY)
                    .bind(plugin_id)
                    .bind(latest)
                    .fetch_all(&mut *tx)
                    .await?;
                let versions: Vec<StoredVersion> = rows.into_iter().map(Into::into).collect();
                Some(history::reconstruct(&versions, latest).map_err(|e| {
                    RepositoryError::DataCorruption(format!("plugin {plugin_id} history: {e}"))
                })?)
            }
            _ => None,
        };

        let stored = history::next_version(policy, number, previous.as_ref(), current);

        let header = sqlx::query_as::<_, PluginVersionHeader>(&format!(
            r"
            INSERT INTO shopforge.plugin_versions
                (plugin_id, version_number, kind, payload, message, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {HEADER_COLUMNS}
            "
        ))
        .bind(plugin_id)
        .bind(stored.number)
        .bind(stored.kind)
        .bind(&stored.payload)
        .bind(message)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "plugin version was committed concurrently"))?;

        tx.commit().await?;

        tracing::info!(
            plugin_id = %plugin_id,
            version = number,
            kind = ?stored.kind,
            "Committed plugin version"
        );

        Ok(header)
    }

    /// Versions needed to reconstruct `up_to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_for(
        &self,
        plugin_id: PluginId,
        up_to: i32,
    ) -> Result<Vec<StoredVersion>, RepositoryError> {
        let rows = sqlx::query_as::<_, VersionRow>(RECONSTRUCTION_QUERY)
            .bind(plugin_id)
            .bind(up_to)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every stored version of a plugin, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load_all(&self, plugin_id: PluginId) -> Result<Vec<StoredVersion>, RepositoryError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r"
            SELECT version_number, kind, payload
            FROM shopforge.plugin_versions
            WHERE plugin_id = $1
            ORDER BY version_number
            ",
        )
        .bind(plugin_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Attach a tag (e.g. `v1.2.0`) to a version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the version does not exist, or
    /// `RepositoryError::Conflict` if the tag is already used by another
    /// version of this plugin.
    pub async fn tag(
        &self,
        plugin_id: PluginId,
        version_number: i32,
        tag: &str,
    ) -> Result<PluginVersionHeader, RepositoryError> {
        sqlx::query_as::<_, PluginVersionHeader>(&format!(
            r"
            UPDATE shopforge.plugin_versions
            SET tag = $3
            WHERE plugin_id = $1 AND version_number = $2
            RETURNING {HEADER_COLUMNS}
            "
        ))
        .bind(plugin_id)
        .bind(version_number)
        .bind(tag)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "tag is already used by another version"))?
        .ok_or(RepositoryError::NotFound)
    }
}
