//! Request and session correlation.
//!
//! Every request gets an `x-request-id` (kept from the upstream proxy when
//! present, otherwise a fresh UUID v4). Guest storefront callers may also
//! send `X-Session-ID`; it is recorded on the span so a cart's requests can
//! be followed without an account.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Guest session header sent by storefront clients.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Longest session id accepted into logs.
const MAX_SESSION_ID_LEN: usize = 128;

/// Ensures every request carries a request id, echoed back in the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    let span = Span::current();
    span.record("request_id", &request_id);

    if let Some(session_id) = session_id(&request) {
        span.record("session_id", session_id);
    }

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn session_id(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(SESSION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_SESSION_ID_LEN)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_echoes_upstream_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "cf-abc123")
                    .header(SESSION_ID_HEADER, "guest-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "cf-abc123"
        );
    }

    #[test]
    fn test_session_id_bounds() {
        let long = "x".repeat(MAX_SESSION_ID_LEN + 1);
        let request = Request::builder()
            .header(SESSION_ID_HEADER, long)
            .body(Body::empty())
            .unwrap();
        assert!(session_id(&request).is_none());

        let request = Request::builder()
            .header(SESSION_ID_HEADER, "abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(session_id(&request), Some("abc"));
    }
}
