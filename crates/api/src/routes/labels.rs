//! Product label handlers.

use axum::{Router, extract::State, routing::get};
use serde_json::Value;

use shopforge_core::ProductLabelId;

use super::{ApiJson, ApiPath, ApiResponse, ApiResult, deleted};
use crate::db::ProductLabelRepository;
use crate::error::AppError;
use crate::middleware::StoreContext;
use crate::models::{ProductLabel, ProductLabelInput};
use crate::state::AppState;

/// Build the product labels router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/product-labels", get(list_labels).post(create_label))
        .route(
            "/product-labels/{id}",
            get(get_label).put(update_label).delete(delete_label),
        )
}

/// Labels in priority order, highest first.
pub async fn list_labels(
    ctx: StoreContext,
    State(state): State<AppState>,
) -> ApiResult<Vec<ProductLabel>> {
    let labels = ProductLabelRepository::new(state.pool())
        .list(ctx.store_id())
        .await?;
    Ok(ApiResponse::ok(labels))
}

pub async fn create_label(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProductLabelInput>,
) -> ApiResult<ProductLabel> {
    body.validate().map_err(AppError::BadRequest)?;
    let label = ProductLabelRepository::new(state.pool())
        .create(ctx.store_id(), &body)
        .await?;
    Ok(ApiResponse::created(label))
}

pub async fn get_label(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductLabelId>,
) -> ApiResult<ProductLabel> {
    let label = ProductLabelRepository::new(state.pool())
        .get(ctx.store_id(), id)
        .await?;
    Ok(ApiResponse::ok(label))
}

pub async fn update_label(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductLabelId>,
    ApiJson(body): ApiJson<ProductLabelInput>,
) -> ApiResult<ProductLabel> {
    body.validate().map_err(AppError::BadRequest)?;
    let label = ProductLabelRepository::new(state.pool())
        .update(ctx.store_id(), id, &body)
        .await?;
    Ok(ApiResponse::ok(label))
}

pub async fn delete_label(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductLabelId>,
) -> ApiResult<Value> {
    let removed = ProductLabelRepository::new(state.pool())
        .delete(ctx.store_id(), id)
        .await?;
    deleted(removed, &format!("product label {id}"))
}
