//! Product label repository.

use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::{ProductLabelId, StoreId};

use super::RepositoryError;
use crate::models::{LabelPosition, ProductLabel, ProductLabelInput};

#[derive(Debug, sqlx::FromRow)]
struct ProductLabelRow {
    id: ProductLabelId,
    store_id: StoreId,
    name: String,
    text: String,
    color: String,
    background_color: String,
    position: String,
    priority: i32,
    is_active: bool,
    conditions: Value,
}

impl TryFrom<ProductLabelRow> for ProductLabel {
    type Error = RepositoryError;

    fn try_from(row: ProductLabelRow) -> Result<Self, Self::Error> {
        let position = LabelPosition::parse(&row.position).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("invalid label position '{}'", row.position))
        })?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            name: row.name,
            text: row.text,
            color: row.color,
            background_color: row.background_color,
            position,
            priority: row.priority,
            is_active: row.is_active,
            conditions: row.conditions,
        })
    }
}

const LABEL_COLUMNS: &str =
    "id, store_id, name, text, color, background_color, position, priority, is_active, conditions";

/// Repository for product label database operations.
pub struct ProductLabelRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductLabelRepository<'a> {
    /// Create a new product label repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A store's labels, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<ProductLabel>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductLabelRow>(&format!(
            r"
            SELECT {LABEL_COLUMNS}
            FROM shopforge.product_labels
            WHERE store_id = $1
            ORDER BY priority DESC, id
            "
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one of a store's labels.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: ProductLabelId,
    ) -> Result<ProductLabel, RepositoryError> {
        let row = sqlx::query_as::<_, ProductLabelRow>(&format!(
            "SELECT {LABEL_COLUMNS} FROM shopforge.product_labels WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Create a label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &ProductLabelInput,
    ) -> Result<ProductLabel, RepositoryError> {
        let row = sqlx::query_as::<_, ProductLabelRow>(&format!(
            r"
            INSERT INTO shopforge.product_labels
                (store_id, name, text, color, background_color, position, priority, is_active, conditions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LABEL_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.text)
        .bind(&input.color)
        .bind(&input.background_color)
        .bind(input.position.as_str())
        .bind(input.priority)
        .bind(input.is_active)
        .bind(&input.conditions)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Replace a label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: ProductLabelId,
        input: &ProductLabelInput,
    ) -> Result<ProductLabel, RepositoryError> {
        let row = sqlx::query_as::<_, ProductLabelRow>(&format!(
            r"
            UPDATE shopforge.product_labels
            SET name = $3, text = $4, color = $5, background_color = $6, position = $7,
                priority = $8, is_active = $9, conditions = $10, updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING {LABEL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.text)
        .bind(&input.color)
        .bind(&input.background_color)
        .bind(input.position.as_str())
        .bind(input.priority)
        .bind(input.is_active)
        .bind(&input.conditions)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a label. Returns `false` if it did not belong to the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, store_id: StoreId, id: ProductLabelId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shopforge.product_labels WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
