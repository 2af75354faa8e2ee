//! API token repository.
//!
//! Only `sha256(pepper || token)` is stored; lookups hash the presented
//! token the same way (see `services::tokens`).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shopforge_core::{ApiRole, ApiTokenId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{ApiToken, Principal};

#[derive(Debug, sqlx::FromRow)]
struct ApiTokenRow {
    id: ApiTokenId,
    user_id: UserId,
    role: ApiRole,
    label: Option<String>,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ApiTokenRow> for ApiToken {
    fn from(row: ApiTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            role: row.role,
            label: row.label,
            last_used_at: row.last_used_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: ApiTokenId,
    user_id: UserId,
    role: ApiRole,
}

/// Repository for API token database operations.
pub struct ApiTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApiTokenRepository<'a> {
    /// Create a new API token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a hash collision.
    pub async fn create(
        &self,
        user_id: UserId,
        role: ApiRole,
        token_hash: &str,
        label: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiToken, RepositoryError> {
        let row = sqlx::query_as::<_, ApiTokenRow>(
            r"
            INSERT INTO shopforge.api_tokens (user_id, role, token_hash, label, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, role, label, last_used_at, expires_at, revoked_at, created_at
            ",
        )
        .bind(user_id)
        .bind(role)
        .bind(token_hash)
        .bind(label)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "token already exists"))?;

        Ok(row.into())
    }

    /// Resolve a token hash to a principal if the token is live.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(&self, token_hash: &str) -> Result<Option<Principal>, RepositoryError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r"
            SELECT id, user_id, role
            FROM shopforge.api_tokens
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| Principal {
            user_id: r.user_id,
            role: r.role,
            token_id: r.id,
        }))
    }

    /// Record that a token was used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch(&self, id: ApiTokenId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shopforge.api_tokens SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke a token. Returns `false` if it was unknown or already revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn revoke(&self, id: ApiTokenId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shopforge.api_tokens
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
