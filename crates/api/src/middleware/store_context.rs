//! Tenant and language context for admin requests.

use axum::{extract::FromRequestParts, http::request::Parts};

use shopforge_core::{LanguageCode, StoreId};

use super::auth::RequireStoreOwner;
use crate::db::StoreRepository;
use crate::error::AppError;
use crate::models::{Principal, Store};
use crate::state::AppState;

/// Header naming the store an admin request operates on.
pub const STORE_ID_HEADER: &str = "x-store-id";

/// Header carrying the caller's preferred content language.
pub const LANGUAGE_HEADER: &str = "x-language";

/// The store selected by `x-store-id`, checked against the caller.
///
/// Owners may only select their own stores; platform admins may select any.
/// Customer tokens are rejected before the store is loaded.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub store: Store,
    pub principal: Principal,
}

impl StoreContext {
    #[must_use]
    pub const fn store_id(&self) -> StoreId {
        self.store.id
    }
}

fn store_id_header(parts: &Parts) -> Result<StoreId, AppError> {
    let raw = parts
        .headers
        .get(STORE_ID_HEADER)
        .ok_or_else(|| AppError::BadRequest("missing x-store-id header".to_owned()))?;
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<StoreId>().ok())
        .filter(|id| id.as_i32() > 0)
        .ok_or_else(|| AppError::BadRequest("invalid x-store-id header".to_owned()))
}

impl FromRequestParts<AppState> for StoreContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<Self>() {
            return Ok(context.clone());
        }

        let RequireStoreOwner(principal) =
            RequireStoreOwner::from_request_parts(parts, state).await?;
        let store_id = store_id_header(parts)?;

        let store = StoreRepository::new(state.pool()).get(store_id).await?;
        let store = match store {
            Some(store) if principal.is_platform_admin() || store.owner_id == principal.user_id => {
                store
            }
            None if principal.is_platform_admin() => {
                return Err(AppError::NotFound(format!("store {store_id}")));
            }
            _ => {
                tracing::warn!(
                    user_id = %principal.user_id,
                    store_id = %store_id,
                    "Store access denied"
                );
                return Err(AppError::Forbidden(
                    "store is not accessible with this token".to_owned(),
                ));
            }
        };

        sentry::configure_scope(|scope| {
            scope.set_tag("store_id", store.id.to_string());
        });

        let context = Self { store, principal };
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

/// Language requested via `X-Language`, if any.
///
/// Resolve against a store with [`RequestLanguage::or_store_default`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLanguage(pub Option<LanguageCode>);

impl RequestLanguage {
    /// The requested language, else the store's default, else English.
    #[must_use]
    pub fn or_store_default(self, store: Option<&Store>) -> LanguageCode {
        self.0
            .or_else(|| store.map(|s| s.default_language.clone()))
            .unwrap_or_else(LanguageCode::english)
    }
}

impl<S> FromRequestParts<S> for RequestLanguage
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(LANGUAGE_HEADER) else {
            return Ok(Self(None));
        };
        let raw = raw
            .to_str()
            .map_err(|_| AppError::BadRequest("invalid X-Language header".to_owned()))?
            .trim();
        if raw.is_empty() {
            return Ok(Self(None));
        }
        Ok(Self(Some(LanguageCode::parse(raw)?)))
    }
}
