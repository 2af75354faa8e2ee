//! Store repository.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::{BillingStatus, LanguageCode, StoreId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewStore, Store, StoreUpdate};

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    owner_id: UserId,
    slug: String,
    name: String,
    default_language: String,
    is_active: bool,
    settings: Value,
    billing_status: BillingStatus,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let default_language = LanguageCode::parse(&row.default_language).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid store language in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            slug: row.slug,
            name: row.name,
            default_language,
            is_active: row.is_active,
            settings: row.settings,
            billing_status: row.billing_status,
            stripe_customer_id: row.stripe_customer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const STORE_COLUMNS: &str = "id, owner_id, slug, name, default_language, is_active, settings, \
                             billing_status, stripe_customer_id, created_at, updated_at";

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stores owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM shopforge.stores WHERE owner_id = $1 ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every store (platform admins).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list_all(&self) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM shopforge.stores ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a store by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is corrupt.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM shopforge.stores WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an active store by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is corrupt.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM shopforge.stores WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a store owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, owner_id: UserId, new: &NewStore) -> Result<Store, RepositoryError> {
        let language = new.default_language.clone().unwrap_or_default();
        let settings = new
            .settings
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            INSERT INTO shopforge.stores (owner_id, slug, name, default_language, settings)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(owner_id)
        .bind(&new.slug)
        .bind(new.name.trim())
        .bind(language.as_str())
        .bind(settings)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "store slug already exists"))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(&self, id: StoreId, update: &StoreUpdate) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            UPDATE shopforge.stores
            SET name = COALESCE($2, name),
                settings = COALESCE($3, settings),
                default_language = COALESCE($4, default_language),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.settings.clone())
        .bind(update.default_language.as_ref().map(LanguageCode::as_str))
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
