//! Public storefront endpoints. No authentication.

use std::sync::Arc;

use axum::{Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopforge_core::slots::SlotConfiguration;
use shopforge_core::{DomainName, StoreId};

use super::slots::validate_page_type;
use super::{ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::db::{
    CustomDomainRepository, PluginRepository, SlotConfigurationRepository, StoreRepository,
};
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::models::{LayoutRecord, Principal, PublicWidget, Store};
use crate::state::AppState;

/// Build the public router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/public/stores/{slug}/layout/{page_type}",
            get(published_layout),
        )
        .route("/public/stores/{slug}/plugins", get(public_plugins))
        .route("/public/resolve-domain", get(resolve_domain))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub host: String,
}

#[derive(Debug, Serialize)]
pub struct ResolvedDomain {
    pub store_id: StoreId,
    pub slug: String,
}

async fn active_store(state: &AppState, slug: &str) -> Result<Store, AppError> {
    StoreRepository::new(state.pool())
        .get_active_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("store '{slug}'")))
}

fn manages(principal: Option<&Principal>, store: &Store) -> bool {
    principal.is_some_and(|p| p.is_platform_admin() || p.user_id == store.owner_id)
}

/// Strip an optional `:port` and parse the `Host` value.
fn parse_host(host: &str) -> Result<DomainName, AppError> {
    let host = host.trim();
    let name = host
        .rsplit_once(':')
        .filter(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .map_or(host, |(name, _)| name);
    Ok(DomainName::parse(name)?)
}

/// The published layout of a page, served from cache.
///
/// The store's own editors bypass the cache so they see a save made on
/// another instance immediately.
#[instrument(skip_all, fields(slug = %slug, page_type = %page_type))]
pub async fn published_layout(
    OptionalAuth(principal): OptionalAuth,
    State(state): State<AppState>,
    ApiPath((slug, page_type)): ApiPath<(String, String)>,
) -> ApiResult<LayoutRecord> {
    validate_page_type(&page_type)?;
    let store = active_store(&state, &slug).await?;
    let bypass_cache = manages(principal.as_ref(), &store);

    if !bypass_cache && let Some(hit) = state.layouts().get(&store.slug, &page_type).await {
        return Ok(ApiResponse::ok(LayoutRecord::clone(&hit)));
    }

    let record = SlotConfigurationRepository::new(state.pool())
        .get(store.id, &page_type)
        .await?
        .unwrap_or_else(|| LayoutRecord {
            configuration: SlotConfiguration::empty(page_type.as_str()),
            version: 0,
            updated_at: None,
        });

    state
        .layouts()
        .insert(&store.slug, &page_type, Arc::new(record.clone()))
        .await;
    Ok(ApiResponse::ok(record))
}

/// Widgets of public, non-deprecated plugins available to the store.
pub async fn public_plugins(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Vec<PublicWidget>> {
    let store = active_store(&state, &slug).await?;
    let widgets = PluginRepository::new(state.pool())
        .public_widgets_for_store(&store.slug)
        .await?;
    Ok(ApiResponse::ok(widgets))
}

/// Map a verified custom domain to its store.
pub async fn resolve_domain(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ResolveQuery>,
) -> ApiResult<ResolvedDomain> {
    let domain = parse_host(&query.host)?;
    let (store_id, slug) = CustomDomainRepository::new(state.pool())
        .resolve(&domain)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("domain '{domain}'")))?;
    Ok(ApiResponse::ok(ResolvedDomain { store_id, slug }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host() {
        assert_eq!(parse_host("Shop.Example.com").unwrap().as_str(), "shop.example.com");
        assert_eq!(parse_host("shop.example.com:8443").unwrap().as_str(), "shop.example.com");
        assert!(parse_host("").is_err());
        assert!(parse_host("not a host").is_err());
    }
}
