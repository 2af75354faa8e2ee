//! Platform maintenance handlers and job polling.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use shopforge_core::translations::{NormalizationTarget, TARGETS};

use super::{ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::db::JobRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequirePlatformAdmin};
use crate::models::Job;
use crate::services::jobs::JobError;
use crate::services::translations::{normalize, select_targets};
use crate::state::AppState;

/// Job kind recorded for background normalization runs.
pub const NORMALIZE_JOB_KIND: &str = "translations.normalize";

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/translations/targets", get(list_targets))
        .route("/admin/translations/normalize", post(normalize_translations))
        .route("/jobs/{id}", get(get_job))
}

#[derive(Debug, Default, Deserialize)]
pub struct NormalizeQuery {
    /// Run in the background and return a job to poll.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Count what would be inserted, then roll back.
    #[serde(default)]
    pub dry_run: bool,
    /// Only this target; all targets when absent.
    #[serde(default)]
    pub target: Option<String>,
}

pub async fn list_targets(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
) -> ApiResult<&'static [NormalizationTarget]> {
    Ok(ApiResponse::ok(TARGETS))
}

/// Copy per-language JSON blobs into the normalized translation tables.
///
/// Synchronous runs return the reports; `?async=true` returns 202 with the
/// job to poll at `/api/jobs/{id}`.
#[instrument(skip_all, fields(user_id = %admin.user_id, run_async = query.run_async, dry_run = query.dry_run))]
pub async fn normalize_translations(
    RequirePlatformAdmin(admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NormalizeQuery>,
) -> Result<Response, AppError> {
    let targets = select_targets(query.target.as_deref())?;
    let dry_run = query.dry_run;

    if !query.run_async {
        let reports = normalize(state.pool(), &targets, dry_run).await?;
        return Ok(ApiResponse::ok(reports).into_response());
    }

    let job = state
        .jobs()
        .spawn(NORMALIZE_JOB_KIND, Some(admin.user_id), move |job| async move {
            let total = targets.len();
            let mut reports = Vec::with_capacity(total);
            for (done, target) in targets.into_iter().enumerate() {
                job.progress(&json!({
                    "completed": done,
                    "total": total,
                    "current": target.name,
                }))
                .await;
                reports.extend(normalize(job.pool(), &[target], dry_run).await?);
            }
            job.progress(&json!({ "completed": total, "total": total }))
                .await;
            serde_json::to_value(&reports).map_err(|e| JobError::Failed(e.to_string()))
        })
        .await?;

    Ok(ApiResponse::accepted(job).into_response())
}

/// Job status. Callers see their own jobs; platform admins see all.
pub async fn get_job(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Job> {
    let job = JobRepository::new(state.pool()).get(id).await?;
    if !principal.is_platform_admin() && job.created_by != Some(principal.user_id) {
        return Err(AppError::NotFound(format!("job {id}")));
    }
    Ok(ApiResponse::ok(job))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query_parsing() {
        let query = parse_query("async=true&dry_run=true&target=product_seo");
        assert!(query.run_async);
        assert!(query.dry_run);
        assert_eq!(query.target.as_deref(), Some("product_seo"));

        let query = parse_query("");
        assert!(!query.run_async);
        assert!(query.target.is_none());
    }

    fn parse_query(query: &str) -> NormalizeQuery {
        let uri: axum::http::Uri = format!("/x?{query}").parse().unwrap();
        axum::extract::Query::<NormalizeQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }
}
