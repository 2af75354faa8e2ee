#![allow(clippy::unwrap_used)]

//! Router-level tests: routing, authentication rejection and the error
//! envelope, without a database.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use shopforge_integration_tests::{test_app, test_state};

async fn send(request: Request<Body>) -> Response {
    test_app().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_token() {
    let routes = [
        "/api/stores",
        "/api/domains",
        "/api/shipping-methods",
        "/api/product-labels",
        "/api/pdf-templates",
        "/api/slot-configurations/home",
        "/api/slot-configurations/home/versions",
        "/api/plugins",
        "/api/admin/translations/targets",
        "/api/jobs/6f1c2a8e-3b7d-4e0f-9a51-2c8d7e6b4a10",
    ];

    for uri in routes {
        let response = send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["success"], false, "{uri}");
        assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()), "{uri}");
    }
}

#[tokio::test]
async fn test_non_bearer_authorization_rejected() {
    let request = Request::builder()
        .uri("/api/stores")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_checked_before_body() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/slot-configurations/home")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Public routes
// =============================================================================

#[tokio::test]
async fn test_resolve_domain_validation() {
    let response = send(get("/api/public/resolve-domain")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);

    let response = send(get("/api/public/resolve-domain?host=localhost")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route() {
    let response = send(get("/api/nothing-here")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Billing webhook
// =============================================================================

#[tokio::test]
async fn test_webhook_requires_signature() {
    let app = shopforge_api::app(
        test_state(|config| {
            config.stripe_webhook_secret = Some("whsec_kV9qL2wX7mR4tY8nB3hJ6zP1".to_owned().into());
        }),
        None,
    );

    let unsigned = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/stripe/webhook")
        .body(Body::from(r#"{"id":"evt_1","type":"customer.subscription.updated"}"#))
        .unwrap();
    let response = app.clone().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/stripe/webhook")
        .header("stripe-signature", "t=1700000000,v1=deadbeef")
        .body(Body::from(r#"{"id":"evt_1","type":"customer.subscription.updated"}"#))
        .unwrap();
    let response = app.oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_disabled_without_secret() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/stripe/webhook")
        .header("stripe-signature", "t=1700000000,v1=deadbeef")
        .body(Body::from("{}"))
        .unwrap();
    assert_eq!(send(request).await.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Correlation
// =============================================================================

#[tokio::test]
async fn test_request_id_kept_from_proxy() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-1234")
        .header("x-session-id", "guest-abc")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "edge-1234");
}
