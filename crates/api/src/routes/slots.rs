//! Page layout (slot configuration) handlers.
//!
//! Every save records a version. Reading an old version replays history
//! from the nearest snapshot; restoring saves it again as the newest version.

use std::collections::BTreeMap;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use shopforge_core::history;
use shopforge_core::slots::{Slot, SlotConfiguration, SlotId, SlotOperation};

use super::{ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::db::SlotConfigurationRepository;
use crate::error::AppError;
use crate::middleware::StoreContext;
use crate::models::{LayoutRecord, LayoutVersion};
use crate::state::AppState;

const MAX_PAGE_TYPE_LEN: usize = 64;

/// Build the slot configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/slot-configurations/{page_type}",
            get(get_layout).put(save_layout),
        )
        .route(
            "/slot-configurations/{page_type}/operations",
            post(apply_operations),
        )
        .route("/slot-configurations/{page_type}/versions", get(list_versions))
        .route(
            "/slot-configurations/{page_type}/versions/{version}",
            get(get_version),
        )
        .route(
            "/slot-configurations/{page_type}/versions/{version}/restore",
            post(restore_version),
        )
}

/// Page types are short lowercase identifiers (`home`, `product`, `cart`).
pub(crate) fn validate_page_type(page_type: &str) -> Result<(), AppError> {
    let valid = !page_type.is_empty()
        && page_type.len() <= MAX_PAGE_TYPE_LEN
        && page_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("invalid page type '{page_type}'")))
    }
}

/// Full layout submitted by the editor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLayoutRequest {
    #[serde(default)]
    pub slots: BTreeMap<SlotId, Slot>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Version the editor loaded; a mismatch is rejected with 409.
    #[serde(default)]
    pub expected_version: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsRequest {
    pub operations: Vec<SlotOperation>,
    #[serde(default)]
    pub expected_version: Option<i32>,
}

/// A reconstructed historical layout.
#[derive(Debug, Serialize)]
pub struct LayoutAtVersion {
    pub version: i32,
    #[serde(flatten)]
    pub configuration: SlotConfiguration,
}

async fn current_layout(
    state: &AppState,
    ctx: &StoreContext,
    page_type: &str,
) -> Result<LayoutRecord, AppError> {
    let record = SlotConfigurationRepository::new(state.pool())
        .get(ctx.store_id(), page_type)
        .await?;
    Ok(record.unwrap_or_else(|| LayoutRecord {
        configuration: SlotConfiguration::empty(page_type),
        version: 0,
        updated_at: None,
    }))
}

async fn save(
    state: &AppState,
    ctx: &StoreContext,
    configuration: &SlotConfiguration,
    expected_version: Option<i32>,
) -> Result<LayoutRecord, AppError> {
    configuration.validate()?;
    let record = SlotConfigurationRepository::new(state.pool())
        .save(
            ctx.store_id(),
            configuration,
            state.config().slot_snapshots,
            Some(ctx.principal.user_id),
            expected_version,
        )
        .await?;
    state
        .layouts()
        .invalidate(&ctx.store.slug, &configuration.page_type)
        .await;
    Ok(record)
}

async fn layout_at(
    state: &AppState,
    ctx: &StoreContext,
    page_type: &str,
    version: i32,
) -> Result<SlotConfiguration, AppError> {
    let versions = SlotConfigurationRepository::new(state.pool())
        .load_versions(ctx.store_id(), page_type, version)
        .await?;
    let document = history::reconstruct(&versions, version)?;
    SlotConfiguration::from_document(page_type, &document)
        .map_err(|e| AppError::Internal(format!("stored layout version {version}: {e}")))
}

/// Current layout; an empty tree at version 0 if the page was never saved.
pub async fn get_layout(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(page_type): ApiPath<String>,
) -> ApiResult<LayoutRecord> {
    validate_page_type(&page_type)?;
    current_layout(&state, &ctx, &page_type)
        .await
        .map(ApiResponse::ok)
}

#[instrument(skip_all, fields(store_id = %ctx.store_id(), page_type = %page_type))]
pub async fn save_layout(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(page_type): ApiPath<String>,
    ApiJson(body): ApiJson<SaveLayoutRequest>,
) -> ApiResult<LayoutRecord> {
    validate_page_type(&page_type)?;
    let configuration = SlotConfiguration {
        page_type,
        slots: body.slots,
        metadata: body.metadata,
    };
    save(&state, &ctx, &configuration, body.expected_version)
        .await
        .map(ApiResponse::ok)
}

/// Apply an editor operation batch to the current tree, then save.
///
/// The batch is all-or-nothing: the first failing operation rejects the
/// request and nothing is saved.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), page_type = %page_type, operations = body.operations.len()))]
pub async fn apply_operations(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(page_type): ApiPath<String>,
    ApiJson(body): ApiJson<OperationsRequest>,
) -> ApiResult<LayoutRecord> {
    validate_page_type(&page_type)?;
    if body.operations.is_empty() {
        return Err(AppError::BadRequest("no operations given".to_owned()));
    }

    let current = current_layout(&state, &ctx, &page_type).await?;
    let updated = current.configuration.apply_all(&body.operations)?;
    let expected = body.expected_version.unwrap_or(current.version);

    save(&state, &ctx, &updated, Some(expected))
        .await
        .map(ApiResponse::ok)
}

pub async fn list_versions(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(page_type): ApiPath<String>,
) -> ApiResult<Vec<LayoutVersion>> {
    validate_page_type(&page_type)?;
    let versions = SlotConfigurationRepository::new(state.pool())
        .list_versions(ctx.store_id(), &page_type)
        .await?;
    Ok(ApiResponse::ok(versions))
}

pub async fn get_version(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((page_type, version)): ApiPath<(String, i32)>,
) -> ApiResult<LayoutAtVersion> {
    validate_page_type(&page_type)?;
    let configuration = layout_at(&state, &ctx, &page_type, version).await?;
    Ok(ApiResponse::ok(LayoutAtVersion {
        version,
        configuration,
    }))
}

/// Save an old version again as the newest one.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), page_type = %page_type, version = %version))]
pub async fn restore_version(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((page_type, version)): ApiPath<(String, i32)>,
) -> ApiResult<LayoutRecord> {
    validate_page_type(&page_type)?;
    let configuration = layout_at(&state, &ctx, &page_type, version).await?;
    let record = save(&state, &ctx, &configuration, None).await?;
    tracing::info!(restored_as = record.version, "Layout version restored");
    Ok(ApiResponse::ok(record))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_page_type_validation() {
        assert!(validate_page_type("home").is_ok());
        assert!(validate_page_type("product_detail-2").is_ok());
        assert!(validate_page_type("").is_err());
        assert!(validate_page_type("Home").is_err());
        assert!(validate_page_type("../etc").is_err());
        assert!(validate_page_type(&"a".repeat(MAX_PAGE_TYPE_LEN + 1)).is_err());
    }

    #[test]
    fn test_save_request_defaults() {
        let body: SaveLayoutRequest = serde_json::from_value(json!({})).unwrap();
        assert!(body.slots.is_empty());
        assert!(body.expected_version.is_none());

        let body: SaveLayoutRequest =
            serde_json::from_value(json!({ "expectedVersion": 3 })).unwrap();
        assert_eq!(body.expected_version, Some(3));
    }
}
