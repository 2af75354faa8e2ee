//! Unified error handling for the API.
//!
//! Every handler returns `Result<_, AppError>`. Errors render as
//! `{ "success": false, "error": "<message>" }` with a matching status code.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use shopforge_core::history::VersionError;
use shopforge_core::plugins::PluginError;
use shopforge_core::shipping::ShippingError;
use shopforge_core::slots::SlotError;
use shopforge_core::translations::TranslationError;
use shopforge_core::{DomainNameError, LanguageCodeError, TransitionError};

use crate::db::RepositoryError;
use crate::services::billing::BillingError;
use crate::services::domain_verification::VerificationError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// The DNS resolver could not be reached or answered garbage.
    #[error("Verification error: {0}")]
    Verification(VerificationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Verification(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(message)) | Self::Conflict(message) => {
                message.clone()
            }
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Verification(_) => "DNS lookup failed; try again later".to_owned(),
            Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::BadRequest(message) => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let body = json!({
            "success": false,
            "error": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

macro_rules! bad_request_from {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<$error> for AppError {
                fn from(e: $error) -> Self {
                    Self::BadRequest(e.to_string())
                }
            }
        )*
    };
}

bad_request_from!(
    SlotError,
    ShippingError,
    PluginError,
    TransitionError,
    DomainNameError,
    LanguageCodeError,
    TranslationError,
    JsonRejection,
    PathRejection,
    QueryRejection,
);

impl From<VersionError> for AppError {
    fn from(e: VersionError) -> Self {
        match e {
            VersionError::NotFound(version) => Self::NotFound(format!("version {version}")),
            // Anything else means the stored history does not replay.
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Database(e) => Self::Database(e),
            VerificationError::Transition(e) => Self::Conflict(e.to_string()),
            other => Self::Verification(other),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Database(e) => Self::Database(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

/// Set the Sentry user context from the authenticated caller.
pub fn set_sentry_user(user_id: i32, role: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
        scope.set_tag("role", role);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("domain 4".to_string());
        assert_eq!(err.to_string(), "Not found: domain 4");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_by_kind() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("taken".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret".to_string()));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(RepositoryError::Conflict("slug taken".to_string()));
        assert_eq!(err.public_message(), "slug taken");
    }

    #[test]
    fn test_domain_errors_are_bad_requests() {
        let err: AppError = SlotError::NotFound(shopforge_core::slots::SlotId::new("x")).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = VersionError::NotFound(9).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = VersionError::Gap(3).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
