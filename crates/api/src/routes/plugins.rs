//! Plugin registry handlers.
//!
//! Store plugins belong to the store in `x-store-id`. Platform plugins
//! (`store_id` null) are created and edited by platform admins only; stores
//! can read the public ones.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use shopforge_core::history::{self, Document, Patch};
use shopforge_core::plugins::{HandlerDefinition, PluginManifest, validate_key, validate_source};
use shopforge_core::{PluginEventListenerId, PluginHookId, PluginId};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, deleted};
use crate::db::{PluginRepository, PluginVersionRepository};
use crate::error::AppError;
use crate::middleware::StoreContext;
use crate::models::{
    Plugin, PluginDetail, PluginHandler, PluginUpdate, PluginVersionHeader, PluginWidget,
    WidgetInput,
};
use crate::state::AppState;

const MAX_TAG_LEN: usize = 64;

/// Build the plugins router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plugins", get(list_plugins).post(create_plugin))
        .route(
            "/plugins/{id}",
            get(get_plugin).patch(update_plugin).delete(delete_plugin),
        )
        .route(
            "/plugins/{id}/widgets/{key}",
            put(upsert_widget).delete(delete_widget),
        )
        .route("/plugins/{id}/listeners", post(add_listener))
        .route("/plugins/{id}/hooks", post(add_hook))
        .route(
            "/plugins/{id}/versions",
            get(list_versions).post(commit_version),
        )
        .route("/plugins/{id}/versions/compare", get(compare_versions))
        .route("/plugins/{id}/versions/{version}", get(get_version))
        .route("/plugins/{id}/versions/{version}/tag", post(tag_version))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePluginQuery {
    /// Register as a platform plugin (platform admins only).
    #[serde(default)]
    pub platform: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub from: i32,
    pub to: i32,
}

/// A reconstructed source document.
#[derive(Debug, Serialize)]
pub struct PluginSourceAtVersion {
    pub version: i32,
    pub document: Document,
}

/// Differences between two versions.
#[derive(Debug, Serialize)]
pub struct VersionComparison {
    pub from: i32,
    pub to: i32,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    #[serde(flatten)]
    pub patch: Patch,
}

/// Whether the caller may modify this plugin.
fn can_edit(ctx: &StoreContext, plugin: &Plugin) -> bool {
    match plugin.store_id {
        Some(store_id) => store_id == ctx.store_id(),
        None => ctx.principal.is_platform_admin(),
    }
}

/// Whether the caller may read this plugin.
fn can_read(ctx: &StoreContext, plugin: &Plugin) -> bool {
    can_edit(ctx, plugin) || (plugin.store_id.is_none() && plugin.is_public)
}

async fn readable(state: &AppState, ctx: &StoreContext, id: PluginId) -> Result<Plugin, AppError> {
    let plugin = PluginRepository::new(state.pool()).get(id).await?;
    if can_read(ctx, &plugin) {
        Ok(plugin)
    } else {
        Err(AppError::NotFound(format!("plugin {id}")))
    }
}

async fn editable(state: &AppState, ctx: &StoreContext, id: PluginId) -> Result<Plugin, AppError> {
    let plugin = readable(state, ctx, id).await?;
    if can_edit(ctx, &plugin) {
        Ok(plugin)
    } else {
        Err(AppError::Forbidden(
            "platform plugins can only be changed by platform admins".to_owned(),
        ))
    }
}

fn validate_handler(handler: &HandlerDefinition) -> Result<(), AppError> {
    if handler.name.trim().is_empty() {
        return Err(AppError::BadRequest("handler name must not be empty".to_owned()));
    }
    validate_source(&format!("handler '{}'", handler.name), &handler.code)?;
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), AppError> {
    if tag.is_empty() || tag.len() > MAX_TAG_LEN || tag.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(format!(
            "invalid tag '{tag}': use 1-{MAX_TAG_LEN} characters without spaces"
        )));
    }
    Ok(())
}

/// The store's plugins plus public platform plugins.
pub async fn list_plugins(
    ctx: StoreContext,
    State(state): State<AppState>,
) -> ApiResult<Vec<Plugin>> {
    let plugins = PluginRepository::new(state.pool())
        .list_for_store(ctx.store_id())
        .await?;
    Ok(ApiResponse::ok(plugins))
}

#[instrument(skip_all, fields(store_id = %ctx.store_id(), slug = %manifest.slug, platform = query.platform))]
pub async fn create_plugin(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CreatePluginQuery>,
    ApiJson(manifest): ApiJson<PluginManifest>,
) -> ApiResult<PluginDetail> {
    manifest.validate()?;
    let owner = if query.platform {
        if !ctx.principal.is_platform_admin() {
            return Err(AppError::Forbidden(
                "only platform admins can register platform plugins".to_owned(),
            ));
        }
        None
    } else {
        Some(ctx.store_id())
    };

    let detail = PluginRepository::new(state.pool())
        .create(owner, &manifest)
        .await?;
    tracing::info!(plugin_id = %detail.plugin.id, "Plugin registered");
    Ok(ApiResponse::created(detail))
}

pub async fn get_plugin(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
) -> ApiResult<PluginDetail> {
    readable(&state, &ctx, id).await?;
    let detail = PluginRepository::new(state.pool()).get_detail(id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Update metadata, publication, or deprecation.
#[instrument(skip_all, fields(plugin_id = %id))]
pub async fn update_plugin(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
    ApiJson(body): ApiJson<PluginUpdate>,
) -> ApiResult<Plugin> {
    editable(&state, &ctx, id).await?;
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name must not be empty".to_owned()));
    }
    let plugin = PluginRepository::new(state.pool()).update(id, &body).await?;
    Ok(ApiResponse::ok(plugin))
}

pub async fn delete_plugin(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
) -> ApiResult<Value> {
    editable(&state, &ctx, id).await?;
    let removed = PluginRepository::new(state.pool()).delete(id).await?;
    deleted(removed, &format!("plugin {id}"))
}

/// Create or replace a widget; its code hash is recomputed.
#[instrument(skip_all, fields(plugin_id = %id, widget_key = %key))]
pub async fn upsert_widget(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((id, key)): ApiPath<(PluginId, String)>,
    ApiJson(body): ApiJson<WidgetInput>,
) -> ApiResult<PluginWidget> {
    validate_key(&key)?;
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("widget name must not be empty".to_owned()));
    }
    validate_source(&format!("widget '{key}'"), &body.code)?;
    editable(&state, &ctx, id).await?;

    let widget = PluginRepository::new(state.pool())
        .upsert_widget(id, &key, &body)
        .await?;
    Ok(ApiResponse::ok(widget))
}

pub async fn delete_widget(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((id, key)): ApiPath<(PluginId, String)>,
) -> ApiResult<Value> {
    editable(&state, &ctx, id).await?;
    let removed = PluginRepository::new(state.pool())
        .delete_widget(id, &key)
        .await?;
    deleted(removed, &format!("widget '{key}'"))
}

pub async fn add_listener(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
    ApiJson(body): ApiJson<HandlerDefinition>,
) -> ApiResult<PluginHandler<PluginEventListenerId>> {
    validate_handler(&body)?;
    editable(&state, &ctx, id).await?;
    let listener = PluginRepository::new(state.pool())
        .add_listener(id, &body)
        .await?;
    Ok(ApiResponse::created(listener))
}

pub async fn add_hook(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
    ApiJson(body): ApiJson<HandlerDefinition>,
) -> ApiResult<PluginHandler<PluginHookId>> {
    validate_handler(&body)?;
    editable(&state, &ctx, id).await?;
    let hook = PluginRepository::new(state.pool()).add_hook(id, &body).await?;
    Ok(ApiResponse::created(hook))
}

pub async fn list_versions(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
) -> ApiResult<Vec<PluginVersionHeader>> {
    readable(&state, &ctx, id).await?;
    let versions = PluginVersionRepository::new(state.pool()).list(id).await?;
    Ok(ApiResponse::ok(versions))
}

/// Commit the plugin's current source as the next version.
#[instrument(skip_all, fields(plugin_id = %id))]
pub async fn commit_version(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
    ApiJson(body): ApiJson<CommitRequest>,
) -> ApiResult<PluginVersionHeader> {
    editable(&state, &ctx, id).await?;
    let source = PluginRepository::new(state.pool()).load_source(id).await?;
    let message = body.message.as_deref().map(str::trim).filter(|m| !m.is_empty());

    let header = PluginVersionRepository::new(state.pool())
        .commit(
            id,
            &source.to_document(),
            state.config().plugin_snapshots,
            message,
            Some(ctx.principal.user_id),
        )
        .await?;
    Ok(ApiResponse::created(header))
}

pub async fn get_version(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((id, version)): ApiPath<(PluginId, i32)>,
) -> ApiResult<PluginSourceAtVersion> {
    readable(&state, &ctx, id).await?;
    let versions = PluginVersionRepository::new(state.pool())
        .load_for(id, version)
        .await?;
    let document = history::reconstruct(&versions, version)?;
    Ok(ApiResponse::ok(PluginSourceAtVersion { version, document }))
}

#[instrument(skip_all, fields(plugin_id = %id, version = %version))]
pub async fn tag_version(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath((id, version)): ApiPath<(PluginId, i32)>,
    ApiJson(body): ApiJson<TagRequest>,
) -> ApiResult<PluginVersionHeader> {
    let tag = body.tag.trim();
    validate_tag(tag)?;
    editable(&state, &ctx, id).await?;
    let header = PluginVersionRepository::new(state.pool())
        .tag(id, version, tag)
        .await?;
    Ok(ApiResponse::ok(header))
}

pub async fn compare_versions(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PluginId>,
    ApiQuery(query): ApiQuery<CompareQuery>,
) -> ApiResult<VersionComparison> {
    readable(&state, &ctx, id).await?;
    let versions = PluginVersionRepository::new(state.pool())
        .load_all(id)
        .await?;
    let patch = history::compare(&versions, query.from, query.to)?;
    let (added, removed, modified) = patch.summary();
    Ok(ApiResponse::ok(VersionComparison {
        from: query.from,
        to: query.to,
        added,
        removed,
        modified,
        patch,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use shopforge_core::plugins::PluginVisibility;
    use shopforge_core::{ApiRole, ApiTokenId, BillingStatus, LanguageCode, StoreId, UserId};

    use super::*;
    use crate::models::{Principal, Store};

    fn ctx(store: i32, role: ApiRole) -> StoreContext {
        StoreContext {
            store: Store {
                id: StoreId::new(store),
                owner_id: UserId::new(1),
                slug: "acme".to_owned(),
                name: "Acme".to_owned(),
                default_language: LanguageCode::english(),
                is_active: true,
                settings: json!({}),
                billing_status: BillingStatus::Active,
                stripe_customer_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            principal: Principal {
                user_id: UserId::new(1),
                role,
                token_id: ApiTokenId::new(1),
            },
        }
    }

    fn plugin(store: Option<i32>, is_public: bool) -> Plugin {
        Plugin {
            id: PluginId::new(9),
            store_id: store.map(StoreId::new),
            slug: "size-guide".to_owned(),
            name: "Size Guide".to_owned(),
            description: None,
            version: "1.0.0".to_owned(),
            author: None,
            is_public,
            is_deprecated: false,
            deprecation_reason: None,
            visibility: PluginVisibility::from_flags(is_public, false),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_plugin_access() {
        let owner = ctx(1, ApiRole::StoreOwner);
        assert!(can_edit(&owner, &plugin(Some(1), false)));
        assert!(!can_read(&owner, &plugin(Some(2), true)));
    }

    #[test]
    fn test_platform_plugin_access() {
        let owner = ctx(1, ApiRole::StoreOwner);
        let admin = ctx(1, ApiRole::PlatformAdmin);

        assert!(can_read(&owner, &plugin(None, true)));
        assert!(!can_edit(&owner, &plugin(None, true)));
        assert!(!can_read(&owner, &plugin(None, false)));
        assert!(can_edit(&admin, &plugin(None, false)));
    }

    #[test]
    fn test_tag_validation() {
        assert!(validate_tag("v1.2.0").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("release one").is_err());
    }
}
