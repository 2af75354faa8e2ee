//! Background job repository.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use shopforge_core::UserId;

use super::RepositoryError;
use crate::models::Job;

const JOB_COLUMNS: &str =
    "id, kind, status, progress, result, error, created_by, created_at, started_at, finished_at";

/// Repository for job status rows.
pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    /// Create a new job repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a queued job.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        id: Uuid,
        kind: &str,
        created_by: Option<UserId>,
    ) -> Result<Job, RepositoryError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r"
            INSERT INTO shopforge.jobs (id, kind, created_by)
            VALUES ($1, $2, $3)
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(id)
        .bind(kind)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;

        Ok(job)
    }

    /// Get a job by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such job exists.
    pub async fn get(&self, id: Uuid) -> Result<Job, RepositoryError> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM shopforge.jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Mark a job as started.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_running(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shopforge.jobs SET status = 'running', started_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Replace the progress document of a running job.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_progress(&self, id: Uuid, progress: &Value) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shopforge.jobs SET progress = $2 WHERE id = $1")
            .bind(id)
            .bind(progress)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Record a successful result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn complete(&self, id: Uuid, result: &Value) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shopforge.jobs
            SET status = 'completed', result = $2, finished_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(result)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Record a failure.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn fail(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shopforge.jobs
            SET status = 'failed', error = $2, finished_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
