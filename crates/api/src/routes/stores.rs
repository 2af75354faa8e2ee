//! Store management handlers.

use axum::{
    Router,
    extract::State,
    routing::get,
};
use tracing::instrument;

use shopforge_core::StoreId;

use super::{ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::db::StoreRepository;
use crate::error::AppError;
use crate::middleware::RequireStoreOwner;
use crate::models::{NewStore, Principal, Store, StoreUpdate};
use crate::state::AppState;

/// Build the stores router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/{id}", get(get_store).patch(update_store))
}

/// Load a store the caller may manage. Foreign stores look missing.
async fn load_owned(state: &AppState, principal: &Principal, id: StoreId) -> Result<Store, AppError> {
    StoreRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|s| principal.is_platform_admin() || s.owner_id == principal.user_id)
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))
}

/// Stores owned by the caller; platform admins see every store.
#[instrument(skip_all, fields(user_id = %principal.user_id))]
pub async fn list_stores(
    RequireStoreOwner(principal): RequireStoreOwner,
    State(state): State<AppState>,
) -> ApiResult<Vec<Store>> {
    let repo = StoreRepository::new(state.pool());
    let stores = if principal.is_platform_admin() {
        repo.list_all().await?
    } else {
        repo.list_for_owner(principal.user_id).await?
    };
    Ok(ApiResponse::ok(stores))
}

#[instrument(skip_all, fields(user_id = %principal.user_id, slug = %body.slug))]
pub async fn create_store(
    RequireStoreOwner(principal): RequireStoreOwner,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewStore>,
) -> ApiResult<Store> {
    body.validate().map_err(AppError::BadRequest)?;
    let store = StoreRepository::new(state.pool())
        .create(principal.user_id, &body)
        .await?;
    tracing::info!(store_id = %store.id, "Store created");
    Ok(ApiResponse::created(store))
}

pub async fn get_store(
    RequireStoreOwner(principal): RequireStoreOwner,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<StoreId>,
) -> ApiResult<Store> {
    load_owned(&state, &principal, id).await.map(ApiResponse::ok)
}

/// Partial update of name, settings, default language, or active flag.
#[instrument(skip_all, fields(store_id = %id))]
pub async fn update_store(
    RequireStoreOwner(principal): RequireStoreOwner,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(body): ApiJson<StoreUpdate>,
) -> ApiResult<Store> {
    body.validate().map_err(AppError::BadRequest)?;
    load_owned(&state, &principal, id).await?;
    let store = StoreRepository::new(state.pool()).update(id, &body).await?;
    Ok(ApiResponse::ok(store))
}
