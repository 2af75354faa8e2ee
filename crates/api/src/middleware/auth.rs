//! Bearer token authentication extractors.
//!
//! The `Authorization: Bearer <token>` header is hashed with the server
//! pepper and looked up in `api_tokens`. The resolved [`Principal`] is cached
//! in the request extensions so later extractors on the same request do not
//! hit the database again.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::Span;

use crate::db::ApiTokenRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::Principal;
use crate::services::tokens::hash_token;
use crate::state::AppState;

/// Why a request failed authentication or authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header.
    MissingToken,
    /// Malformed header, or the token is unknown, revoked, or expired.
    InvalidToken,
    /// Authenticated, but the role is not allowed here.
    Forbidden,
    /// The token store could not be queried.
    Unavailable,
}

impl AuthRejection {
    const fn status(self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::MissingToken => "authentication required",
            Self::InvalidToken => "invalid or expired token",
            Self::Forbidden => "insufficient permissions",
            Self::Unavailable => "An internal error occurred",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({ "success": false, "error": self.message() })),
        )
            .into_response()
    }
}

impl From<AuthRejection> for AppError {
    fn from(rejection: AuthRejection) -> Self {
        let message = rejection.message().to_owned();
        match rejection {
            AuthRejection::MissingToken | AuthRejection::InvalidToken => Self::Unauthorized(message),
            AuthRejection::Forbidden => Self::Forbidden(message),
            AuthRejection::Unavailable => Self::Internal(message),
        }
    }
}

/// Extract the bearer token. `Ok(None)` when the header is absent.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthRejection> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthRejection::InvalidToken)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::InvalidToken)?;
    Ok(Some(token))
}

/// Resolve the caller, if any. Invalid tokens are rejected even where
/// authentication is optional.
async fn authenticate(
    parts: &mut Parts,
    state: &AppState,
) -> Result<Option<Principal>, AuthRejection> {
    if let Some(principal) = parts.extensions.get::<Principal>() {
        return Ok(Some(*principal));
    }

    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };

    let hash = hash_token(&state.config().token_pepper, token);
    let principal = ApiTokenRepository::new(state.pool())
        .find_active(&hash)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token lookup failed");
            AuthRejection::Unavailable
        })?
        .ok_or(AuthRejection::InvalidToken)?;

    let pool = state.pool().clone();
    let token_id = principal.token_id;
    tokio::spawn(async move {
        if let Err(e) = ApiTokenRepository::new(&pool).touch(token_id).await {
            tracing::warn!(token_id = %token_id, error = %e, "Failed to record token use");
        }
    });

    Span::current().record("user_id", principal.user_id.as_i32());
    set_sentry_user(principal.user_id.as_i32(), &principal.role.to_string());
    parts.extensions.insert(principal);

    Ok(Some(principal))
}

/// Requires any valid token.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(principal): RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", principal.user_id)
/// }
/// ```
pub struct RequireAuth(pub Principal);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await?
            .map(Self)
            .ok_or(AuthRejection::MissingToken)
    }
}

/// Requires a store owner or platform admin token.
pub struct RequireStoreOwner(pub Principal);

impl FromRequestParts<AppState> for RequireStoreOwner {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;
        if principal.can_manage_stores() {
            Ok(Self(principal))
        } else {
            Err(AuthRejection::Forbidden)
        }
    }
}

/// Requires a platform admin token.
pub struct RequirePlatformAdmin(pub Principal);

impl FromRequestParts<AppState> for RequirePlatformAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;
        if principal.is_platform_admin() {
            Ok(Self(principal))
        } else {
            Err(AuthRejection::Forbidden)
        }
    }
}

/// The caller if a token was sent; `None` for anonymous requests.
pub struct OptionalAuth(pub Option<Principal>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/stores");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(None)), Ok(None));
        assert_eq!(bearer_token(&parts(Some("Bearer sf_abc"))), Ok(Some("sf_abc")));
        assert_eq!(bearer_token(&parts(Some("bearer sf_abc "))), Ok(Some("sf_abc")));
        assert_eq!(
            bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))),
            Err(AuthRejection::InvalidToken)
        );
        assert_eq!(
            bearer_token(&parts(Some("Bearer "))),
            Err(AuthRejection::InvalidToken)
        );
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            AuthRejection::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthRejection::Unavailable.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_into_app_error() {
        assert!(matches!(
            AppError::from(AuthRejection::Forbidden),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            AppError::from(AuthRejection::InvalidToken),
            AppError::Unauthorized(_)
        ));
    }
}
