//! PDF template repository.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::{PdfTemplateId, StoreId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{PdfTemplate, PdfTemplateInput, PdfTemplateType};

#[derive(Debug, sqlx::FromRow)]
struct PdfTemplateRow {
    id: PdfTemplateId,
    store_id: StoreId,
    template_type: String,
    name: String,
    html_template: String,
    settings: Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PdfTemplateRow> for PdfTemplate {
    type Error = RepositoryError;

    fn try_from(row: PdfTemplateRow) -> Result<Self, Self::Error> {
        let template_type = PdfTemplateType::parse(&row.template_type).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "invalid template type '{}'",
                row.template_type
            ))
        })?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            template_type,
            name: row.name,
            html_template: row.html_template,
            settings: row.settings,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TEMPLATE_COLUMNS: &str =
    "id, store_id, template_type, name, html_template, settings, is_active, created_at, updated_at";

const DUPLICATE_NAME: &str = "a template of this type with this name already exists";

/// Repository for PDF template database operations.
pub struct PdfTemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PdfTemplateRepository<'a> {
    /// Create a new PDF template repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A store's templates grouped by type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<PdfTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, PdfTemplateRow>(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS}
            FROM shopforge.pdf_templates
            WHERE store_id = $1
            ORDER BY template_type, name
            "
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one of a store's templates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: PdfTemplateId,
    ) -> Result<PdfTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, PdfTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM shopforge.pdf_templates WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the (type, name) pair is taken.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &PdfTemplateInput,
    ) -> Result<PdfTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, PdfTemplateRow>(&format!(
            r"
            INSERT INTO shopforge.pdf_templates
                (store_id, template_type, name, html_template, settings, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.template_type.as_str())
        .bind(input.name.trim())
        .bind(&input.html_template)
        .bind(&input.settings)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;

        row.try_into()
    }

    /// Replace a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the store,
    /// or `RepositoryError::Conflict` if the new (type, name) pair is taken.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: PdfTemplateId,
        input: &PdfTemplateInput,
    ) -> Result<PdfTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, PdfTemplateRow>(&format!(
            r"
            UPDATE shopforge.pdf_templates
            SET template_type = $3, name = $4, html_template = $5, settings = $6,
                is_active = $7, updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.template_type.as_str())
        .bind(input.name.trim())
        .bind(&input.html_template)
        .bind(&input.settings)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a template. Returns `false` if it did not belong to the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, store_id: StoreId, id: PdfTemplateId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shopforge.pdf_templates WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
