//! Background jobs with status recorded for polling clients.
//!
//! A job is a tokio task whose lifecycle (`queued → running → completed |
//! failed`) is mirrored into the `jobs` table. Clients poll
//! `GET /api/jobs/{id}` until the status is terminal. A job that returns an
//! error or panics is recorded as failed.

use std::future::Future;

use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use shopforge_core::UserId;

use crate::db::{JobRepository, RepositoryError};
use crate::models::Job;

/// Errors a job body can return.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("{0}")]
    Failed(String),
}

/// Handle passed to a running job.
#[derive(Clone)]
pub struct JobContext {
    id: Uuid,
    pool: PgPool,
}

impl JobContext {
    /// This job's id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The shared connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Publish progress. Failures are logged and otherwise ignored.
    pub async fn progress(&self, progress: &Value) {
        if let Err(e) = JobRepository::new(&self.pool)
            .update_progress(self.id, progress)
            .await
        {
            tracing::warn!(job_id = %self.id, error = %e, "Failed to record job progress");
        }
    }
}

/// Spawns jobs onto the tokio runtime.
#[derive(Clone)]
pub struct JobRunner {
    pool: PgPool,
}

impl JobRunner {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a queued job and start it in the background.
    ///
    /// Returns as soon as the job row exists; the body runs on its own task.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the job row cannot be created.
    pub async fn spawn<F, Fut>(
        &self,
        kind: &str,
        created_by: Option<UserId>,
        body: F,
    ) -> Result<Job, RepositoryError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, JobError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let job = JobRepository::new(&self.pool)
            .create(id, kind, created_by)
            .await?;

        let ctx = JobContext {
            id,
            pool: self.pool.clone(),
        };
        let kind = kind.to_owned();
        tokio::spawn(async move {
            let pool = ctx.pool.clone();
            let jobs = JobRepository::new(&pool);
            if let Err(e) = jobs.mark_running(id).await {
                tracing::warn!(job_id = %id, error = %e, "Failed to mark job running");
            }

            // The body runs on its own task so a panic surfaces as a JoinError.
            let outcome = tokio::spawn(body(ctx)).await;
            let recorded = match outcome {
                Ok(Ok(result)) => {
                    tracing::info!(job_id = %id, kind = %kind, "Job completed");
                    jobs.complete(id, &result).await
                }
                Ok(Err(e)) => {
                    tracing::error!(job_id = %id, kind = %kind, error = %e, "Job failed");
                    jobs.fail(id, &e.to_string()).await
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        "job panicked".to_owned()
                    } else {
                        "job was cancelled".to_owned()
                    };
                    tracing::error!(job_id = %id, kind = %kind, "{message}");
                    jobs.fail(id, &message).await
                }
            };
            if let Err(e) = recorded {
                tracing::error!(job_id = %id, error = %e, "Failed to record job outcome");
            }
        });

        Ok(job)
    }
}
