//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shopforge_core::UserId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, created_at
            FROM shopforge.users
            WHERE email = LOWER($1)
            ",
        )
        .bind(email.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, email: &str, name: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shopforge.users (email, name)
            VALUES (LOWER($1), $2)
            RETURNING id, email, name, created_at
            ",
        )
        .bind(email.trim())
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        Ok(row.into())
    }

    /// Find a user by email, creating one if none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(&self, email: &str, name: &str) -> Result<User, RepositoryError> {
        if let Some(user) = self.get_by_email(email).await? {
            return Ok(user);
        }
        match self.create(email, name).await {
            // Lost a race with a concurrent insert of the same email.
            Err(RepositoryError::Conflict(_)) => self
                .get_by_email(email)
                .await?
                .ok_or(RepositoryError::NotFound),
            other => other,
        }
    }
}
