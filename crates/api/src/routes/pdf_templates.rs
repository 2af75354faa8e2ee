//! PDF template handlers (invoices, packing slips, credit memos).

use axum::{Router, extract::State, routing::get};
use serde_json::Value;
use tracing::instrument;

use shopforge_core::PdfTemplateId;

use super::{ApiJson, ApiPath, ApiResponse, ApiResult, deleted};
use crate::db::PdfTemplateRepository;
use crate::error::AppError;
use crate::middleware::StoreContext;
use crate::models::{PdfTemplate, PdfTemplateInput};
use crate::state::AppState;

/// Build the PDF templates router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pdf-templates", get(list_templates).post(create_template))
        .route(
            "/pdf-templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
}

pub async fn list_templates(
    ctx: StoreContext,
    State(state): State<AppState>,
) -> ApiResult<Vec<PdfTemplate>> {
    let templates = PdfTemplateRepository::new(state.pool())
        .list(ctx.store_id())
        .await?;
    Ok(ApiResponse::ok(templates))
}

#[instrument(skip_all, fields(store_id = %ctx.store_id(), template_type = body.template_type.as_str()))]
pub async fn create_template(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PdfTemplateInput>,
) -> ApiResult<PdfTemplate> {
    body.validate().map_err(AppError::BadRequest)?;
    let template = PdfTemplateRepository::new(state.pool())
        .create(ctx.store_id(), &body)
        .await?;
    Ok(ApiResponse::created(template))
}

pub async fn get_template(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PdfTemplateId>,
) -> ApiResult<PdfTemplate> {
    let template = PdfTemplateRepository::new(state.pool())
        .get(ctx.store_id(), id)
        .await?;
    Ok(ApiResponse::ok(template))
}

pub async fn update_template(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PdfTemplateId>,
    ApiJson(body): ApiJson<PdfTemplateInput>,
) -> ApiResult<PdfTemplate> {
    body.validate().map_err(AppError::BadRequest)?;
    let template = PdfTemplateRepository::new(state.pool())
        .update(ctx.store_id(), id, &body)
        .await?;
    Ok(ApiResponse::ok(template))
}

pub async fn delete_template(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PdfTemplateId>,
) -> ApiResult<Value> {
    let removed = PdfTemplateRepository::new(state.pool())
        .delete(ctx.store_id(), id)
        .await?;
    deleted(removed, &format!("pdf template {id}"))
}
