//! Shipping method repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::{LanguageCode, ShippingMethodId, StoreId};

use super::{RepositoryError, decode_json, encode_json};
use crate::models::{ShippingMethod, ShippingMethodInput};

#[derive(Debug, sqlx::FromRow)]
struct ShippingMethodRow {
    id: ShippingMethodId,
    store_id: StoreId,
    name: String,
    is_active: bool,
    sort_order: i32,
    method: Value,
    conditions: Value,
    translations: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShippingMethodRow> for ShippingMethod {
    type Error = RepositoryError;

    fn try_from(row: ShippingMethodRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            name: row.name,
            is_active: row.is_active,
            sort_order: row.sort_order,
            method: decode_json(row.method, "shipping method")?,
            conditions: decode_json(row.conditions, "shipping conditions")?,
            translations: row.translations,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const METHOD_COLUMNS: &str = "id, store_id, name, is_active, sort_order, method, conditions, \
                              translations, created_at, updated_at";

/// Repository for shipping method database operations.
pub struct ShippingMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingMethodRepository<'a> {
    /// Create a new shipping method repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A store's methods in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list(
        &self,
        store_id: StoreId,
        active_only: bool,
    ) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            r"
            SELECT {METHOD_COLUMNS}
            FROM shopforge.shipping_methods
            WHERE store_id = $1 AND (is_active OR NOT $2)
            ORDER BY sort_order, id
            "
        ))
        .bind(store_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one of a store's methods.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: ShippingMethodId,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            "SELECT {METHOD_COLUMNS} FROM shopforge.shipping_methods WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Create a method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &ShippingMethodInput,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            r"
            INSERT INTO shopforge.shipping_methods
                (store_id, name, is_active, sort_order, method, conditions, translations)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.name.trim())
        .bind(input.is_active)
        .bind(input.sort_order)
        .bind(encode_json(&input.method, "shipping method")?)
        .bind(encode_json(&input.conditions, "shipping conditions")?)
        .bind(input.translations.clone())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Replace a method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: ShippingMethodId,
        input: &ShippingMethodInput,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            r"
            UPDATE shopforge.shipping_methods
            SET name = $3, is_active = $4, sort_order = $5, method = $6,
                conditions = $7, translations = $8, updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.name.trim())
        .bind(input.is_active)
        .bind(input.sort_order)
        .bind(encode_json(&input.method, "shipping method")?)
        .bind(encode_json(&input.conditions, "shipping conditions")?)
        .bind(input.translations.clone())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a method. Returns `false` if it did not belong to the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, store_id: StoreId, id: ShippingMethodId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shopforge.shipping_methods WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Translated method names for a language from the normalized
    /// translation table.
    ///
    /// An exact match (`fr-CA`) wins over the bare language (`fr`). Methods
    /// without a translated name are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn localized_names(
        &self,
        store_id: StoreId,
        language: &LanguageCode,
    ) -> Result<HashMap<ShippingMethodId, String>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ShippingMethodId, String, String)>(
            r"
            SELECT t.shipping_method_id, t.language_code, t.name
            FROM shopforge.shipping_method_translations t
            JOIN shopforge.shipping_methods m ON m.id = t.shipping_method_id
            WHERE m.store_id = $1
              AND t.language_code IN ($2, $3)
              AND COALESCE(t.name, '') <> ''
            ",
        )
        .bind(store_id)
        .bind(language.as_str())
        .bind(language.language())
        .fetch_all(self.pool)
        .await?;

        let mut names = HashMap::new();
        for (id, code, name) in rows {
            if code == language.as_str() || !names.contains_key(&id) {
                names.insert(id, name);
            }
        }
        Ok(names)
    }
}
