//! Custom domain handlers.
//!
//! A domain is added as `pending` with a verification token and the DNS
//! records to publish. Verification runs on demand here and periodically
//! through `sf-cli domains sweep`.

use axum::{
    Router,
    extract::State,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use shopforge_core::{CustomDomainId, DomainName, DomainVerificationStatus, SslStatus};

use super::{ApiJson, ApiPath, ApiResponse, ApiResult, deleted};
use crate::db::CustomDomainRepository;
use crate::error::AppError;
use crate::middleware::StoreContext;
use crate::models::CustomDomain;
use crate::services::domain_verification::{
    dns_records_for, generate_verification_token, verify_domain,
};
use crate::state::AppState;

/// Build the domains router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/domains", get(list_domains).post(add_domain))
        .route("/domains/{id}", get(get_domain).delete(delete_domain))
        .route("/domains/{id}/verify", post(verify))
        .route("/domains/{id}/primary", post(make_primary))
        .route("/domains/{id}/ssl", patch(update_ssl))
}

#[derive(Debug, Deserialize)]
pub struct AddDomainRequest {
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct SslUpdateRequest {
    pub status: SslStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Host storefront traffic is routed to; custom domains CNAME here.
fn target_host(base_url: &str) -> String {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| base_url.to_owned())
}

pub async fn list_domains(
    ctx: StoreContext,
    State(state): State<AppState>,
) -> ApiResult<Vec<CustomDomain>> {
    let domains = CustomDomainRepository::new(state.pool())
        .list(ctx.store_id())
        .await?;
    Ok(ApiResponse::ok(domains))
}

/// Register a domain; the response carries the DNS records to publish.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), domain = %body.domain))]
pub async fn add_domain(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddDomainRequest>,
) -> ApiResult<CustomDomain> {
    let domain = DomainName::parse(&body.domain)?;
    let token = generate_verification_token();
    let records = dns_records_for(&domain, &token, &target_host(&state.config().base_url));

    let created = CustomDomainRepository::new(state.pool())
        .create(ctx.store_id(), &domain, &token, &records)
        .await?;

    tracing::info!(domain_id = %created.id, "Custom domain added");
    Ok(ApiResponse::created(created))
}

pub async fn get_domain(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomDomainId>,
) -> ApiResult<CustomDomain> {
    let domain = CustomDomainRepository::new(state.pool())
        .get(ctx.store_id(), id)
        .await?;
    Ok(ApiResponse::ok(domain))
}

/// Run the TXT check now.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), domain_id = %id))]
pub async fn verify(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomDomainId>,
) -> ApiResult<CustomDomain> {
    let domain = CustomDomainRepository::new(state.pool())
        .get(ctx.store_id(), id)
        .await?;
    let updated = verify_domain(state.pool(), state.resolver(), &domain).await?;
    Ok(ApiResponse::ok(updated))
}

/// Make a verified domain the store's primary, clearing the previous one.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), domain_id = %id))]
pub async fn make_primary(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomDomainId>,
) -> ApiResult<CustomDomain> {
    let repo = CustomDomainRepository::new(state.pool());
    let domain = repo.get(ctx.store_id(), id).await?;
    if domain.verification_status != DomainVerificationStatus::Verified {
        return Err(AppError::Conflict(
            "only a verified domain can be primary".to_owned(),
        ));
    }
    let updated = repo.set_primary(ctx.store_id(), id).await?;
    Ok(ApiResponse::ok(updated))
}

/// Record an SSL status change reported by the certificate provider.
#[instrument(skip_all, fields(store_id = %ctx.store_id(), domain_id = %id, ssl = %body.status))]
pub async fn update_ssl(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomDomainId>,
    ApiJson(body): ApiJson<SslUpdateRequest>,
) -> ApiResult<CustomDomain> {
    let repo = CustomDomainRepository::new(state.pool());
    let domain = repo.get(ctx.store_id(), id).await?;
    let next = domain.state().advance_ssl(body.status)?;
    let expires_at = match next.ssl {
        SslStatus::Active => body.expires_at,
        _ => None,
    };
    let updated = repo
        .set_ssl(ctx.store_id(), id, domain.state(), next.ssl, expires_at)
        .await?;
    Ok(ApiResponse::ok(updated))
}

pub async fn delete_domain(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CustomDomainId>,
) -> ApiResult<Value> {
    let removed = CustomDomainRepository::new(state.pool())
        .delete(ctx.store_id(), id)
        .await?;
    deleted(removed, &format!("domain {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_host() {
        assert_eq!(target_host("https://shops.shopforge.io"), "shops.shopforge.io");
        assert_eq!(target_host("https://shops.shopforge.io:8443/x"), "shops.shopforge.io");
        assert_eq!(target_host("not a url"), "not a url");
    }
}
