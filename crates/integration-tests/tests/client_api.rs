//! `shopforge-client` driving the real API router over TCP.

#![allow(clippy::unwrap_used)]

use axum::http::Method;
use serde_json::{Value, json};

use shopforge_client::{ApiClient, ClientError, Role, Session};
use shopforge_core::StoreId;
use shopforge_integration_tests::test_app;

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, test_app()).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_validation_error_surfaces_message() {
    let client = ApiClient::new(&serve().await, Session::guest("guest-1")).unwrap();

    let err = client
        .request::<Value, ()>(
            Role::Public,
            Method::GET,
            "/api/public/resolve-domain?host=-bad-.example.com",
            None,
        )
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_signed_out_calls_never_leave_the_client() {
    let session = Session {
        store_id: Some(StoreId::new(4)),
        ..Session::default()
    };
    let client = ApiClient::new(&serve().await, session).unwrap();

    let err = client.get_layout("home").await.unwrap_err();
    assert!(matches!(err, ClientError::NotSignedIn { role: Role::StoreOwner }));
    assert!(err.is_session_expired());
}

#[tokio::test]
async fn test_disabled_webhook_is_not_found() {
    let client = ApiClient::new(&serve().await, Session::default()).unwrap();

    let err = client
        .request::<Value, _>(
            Role::Public,
            Method::POST,
            "/api/billing/stripe/webhook",
            Some(&json!({ "id": "evt_1" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_health_is_a_bare_payload() {
    let client = ApiClient::new(&serve().await, Session::default()).unwrap();

    // `/health` answers plain text, which is not JSON.
    let err = client
        .request::<Value, ()>(Role::Public, Method::GET, "/health", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}
