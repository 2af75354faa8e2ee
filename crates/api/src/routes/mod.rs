//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Admin (bearer token, most routes scoped by x-store-id)
//! /api/stores                     - Store CRUD
//! /api/domains                    - Custom domains, verification, SSL
//! /api/shipping-methods           - Shipping methods and cart quotes
//! /api/product-labels             - Product badges
//! /api/pdf-templates              - Invoice/packing slip templates
//! /api/slot-configurations        - Page layouts with version history
//! /api/plugins                    - Plugin registry and source history
//! /api/admin/translations         - Platform admin maintenance
//! /api/jobs/{id}                  - Background job status
//!
//! # Public storefront (no auth)
//! /api/public/stores/{slug}/...   - Published layouts and widgets
//! /api/public/resolve-domain      - Custom domain lookup
//!
//! # Webhooks
//! /api/billing/stripe/webhook     - Stripe subscription events
//! ```
//!
//! Every response is an envelope: `{ "success": true, "data": ... }` on
//! success, `{ "success": false, "error": "..." }` on failure.

pub mod admin;
pub mod billing;
pub mod domains;
pub mod labels;
pub mod pdf_templates;
pub mod plugins;
pub mod public;
pub mod shipping;
pub mod slots;
pub mod stores;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

/// Successful response wrapped in the `{ success, data }` envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK.
    pub const fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    /// 201 Created.
    pub const fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }

    /// 202 Accepted, for work handed to a background job.
    pub const fn accepted(data: T) -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            data,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    data: &'a T,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: true,
            data: &self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

/// JSON body extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Handler result type.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// `{ "deleted": true }` payload, or 404 when nothing was removed.
pub(crate) fn deleted(removed: bool, what: &str) -> ApiResult<serde_json::Value> {
    if removed {
        Ok(ApiResponse::ok(json!({ "deleted": true })))
    } else {
        Err(AppError::NotFound(what.to_owned()))
    }
}

/// All `/api` routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(stores::router())
        .merge(domains::router())
        .merge(shipping::router())
        .merge(labels::router())
        .merge(pdf_templates::router())
        .merge(slots::router())
        .merge(plugins::router())
        .merge(admin::router())
        .merge(public::router())
        .merge(billing::router());

    Router::new().nest("/api", api)
}
