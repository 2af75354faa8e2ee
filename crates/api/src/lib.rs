//! Shopforge API - multi-tenant REST backend for stores.
//!
//! Store owners configure their shops through bearer-token authenticated
//! routes scoped by `x-store-id`; storefronts read published layouts and
//! widgets through unauthenticated public routes.
//!
//! # Architecture
//!
//! - Axum web framework, JSON envelopes everywhere
//! - `PostgreSQL` via sqlx (schema `shopforge`)
//! - Pure domain logic (layouts, history, shipping, plugins) in `shopforge-core`
//! - Sentry + tracing for observability

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderName, Method, StatusCode, header},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::rate_limit::RateLimiterLayer;
use crate::middleware::request_id::{REQUEST_ID_HEADER, SESSION_ID_HEADER};
use crate::middleware::store_context::{LANGUAGE_HEADER, STORE_ID_HEADER};
use crate::state::AppState;

/// Build the full application router.
///
/// `rate_limit` wraps every `/api` route; health checks stay unlimited.
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState, rate_limit: Option<RateLimiterLayer>) -> Router {
    let mut api = routes::routes();
    if let Some(limiter) = rate_limit {
        api = api.layer(limiter);
    }

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(api)
        .layer(cors_layer())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        session_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        #[allow(clippy::cast_possible_truncation)]
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Storefronts on custom domains call the API cross-origin with bearer
/// tokens, never cookies, so any origin is allowed.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(STORE_ID_HEADER),
            HeaderName::from_static(LANGUAGE_HEADER),
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER), header::RETRY_AFTER])
        .max_age(Duration::from_secs(3600))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ApiConfig;

    fn test_app() -> Router {
        // Nothing listens here; only routes that reject early are exercised.
        let config = ApiConfig::for_tests("postgres://shopforge@127.0.0.1:1/shopforge");
        let pool = db::create_lazy_pool(&config.database_url).unwrap();
        let state = AppState::new(config, pool).unwrap();
        app(state, None)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_admin_route_requires_token() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/shipping-methods")
                    .header(STORE_ID_HEADER, "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_disabled_without_secret() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/billing/stripe/webhook")
                    .header("stripe-signature", "t=1,v1=00")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resolve_domain_rejects_bad_host() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/public/resolve-domain?host=not_a_domain")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/public/resolve-domain")
                    .header(header::ORIGIN, "https://shop.example.org")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-store-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
