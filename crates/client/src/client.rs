//! HTTP plumbing: headers, retries, session expiry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::instrument;

use shopforge_core::retry::{RetryPolicy, parse_retry_after};

use crate::error::ClientError;
use crate::response::{decode_success, error_message};
use crate::session::{Role, Session};

pub(crate) const STORE_ID_HEADER: &str = "x-store-id";
pub(crate) const LANGUAGE_HEADER: &str = "X-Language";
pub(crate) const SESSION_ID_HEADER: &str = "X-Session-ID";

/// Shopforge API client.
///
/// Cheap to clone; clones share the session, so a token cleared after a
/// 401 is gone for every clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
    retry: RetryPolicy,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: String,
    session: RwLock<Session>,
}

impl ApiClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client fails to build.
    pub fn new(base_url: &str, session: Session) -> Result<Self, ClientError> {
        url::Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                session: RwLock::new(session),
            }),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A copy of the current session.
    pub async fn session(&self) -> Session {
        self.inner.session.read().await.clone()
    }

    /// Replace the session (sign-in, store switch).
    pub async fn set_session(&self, session: Session) {
        *self.inner.session.write().await = session;
    }

    /// Send a request and decode the payload.
    ///
    /// `path` starts with `/api`. Store-scoped calls should go through
    /// [`Self::store_request`] so a missing store is caught client-side.
    #[instrument(skip(self, body), fields(method = %method, path = %path, role = %role))]
    pub async fn request<T, B>(
        &self,
        role: Role,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{path}", self.inner.base_url);
        let mut attempt = 0;

        loop {
            let mut request = self.inner.http.request(method.clone(), &url);
            request = self.apply_session(request, role).await?;
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
                && role != Role::Public
            {
                self.inner.session.write().await.clear(role);
                tracing::warn!(status = status.as_u16(), "Session rejected, token cleared");
                return Err(ClientError::SessionExpired { role });
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);

                if self.retry.should_retry(status.as_u16(), attempt) {
                    let delay = self.retry.delay_for(attempt, retry_after);
                    tracing::debug!(
                        status = status.as_u16(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(ClientError::RateLimited { retry_after });
                }
            }

            let bytes = response.bytes().await?;
            if status.is_success() {
                return decode_success(status.as_u16(), &bytes);
            }
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &bytes),
            });
        }
    }

    /// [`Self::request`] for routes that need `x-store-id`.
    ///
    /// # Errors
    ///
    /// Returns `NoStoreSelected` without sending anything when the session
    /// has no store.
    pub async fn store_request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        if self.inner.session.read().await.store_id.is_none() {
            return Err(ClientError::NoStoreSelected);
        }
        self.request(Role::StoreOwner, method, path, body).await
    }

    async fn apply_session(
        &self,
        mut request: reqwest::RequestBuilder,
        role: Role,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let session = self.inner.session.read().await;

        if role != Role::Public {
            let token = session
                .token_for(role)
                .ok_or(ClientError::NotSignedIn { role })?;
            request = request.bearer_auth(token);
        }
        if let Some(store_id) = session.store_id {
            request = request.header(STORE_ID_HEADER, store_id.to_string());
        }
        if let Some(language) = &session.language {
            request = request.header(LANGUAGE_HEADER, language.as_str());
        }
        if let Some(session_id) = &session.session_id {
            request = request.header(SESSION_ID_HEADER, session_id.as_str());
        }
        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::get,
    };
    use serde_json::{Value, json};

    use shopforge_core::{LanguageCode, StoreId};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            retry_server_errors: false,
        }
    }

    #[tokio::test]
    async fn test_headers_from_session() {
        let router = Router::new().route(
            "/api/echo",
            get(|headers: HeaderMap| async move {
                let get = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned)
                };
                Json(json!({
                    "success": true,
                    "data": {
                        "auth": get("authorization"),
                        "store": get("x-store-id"),
                        "language": get("x-language"),
                        "session": get("x-session-id"),
                    }
                }))
            }),
        );
        let base = serve(router).await;

        let mut session = Session::store_owner("owner", StoreId::new(9))
            .with_language(LanguageCode::parse("de-AT").unwrap());
        session.session_id = Some("guest-1".to_owned());
        let client = ApiClient::new(&base, session).unwrap();

        let echoed: Value = client
            .request(Role::StoreOwner, Method::GET, "/api/echo", None::<&()>)
            .await
            .unwrap();
        assert_eq!(echoed["auth"], "Bearer owner");
        assert_eq!(echoed["store"], "9");
        assert_eq!(echoed["language"], "de-AT");
        assert_eq!(echoed["session"], "guest-1");

        let public: Value = client
            .request(Role::Public, Method::GET, "/api/echo", None::<&()>)
            .await
            .unwrap();
        assert_eq!(public["auth"], Value::Null);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token() {
        let router = Router::new().route(
            "/api/stores",
            get(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({ "success": false, "error": "invalid token" })),
                )
            }),
        );
        let base = serve(router).await;
        let client = ApiClient::new(&base, Session::store_owner("stale", StoreId::new(1))).unwrap();

        let err = client
            .request::<Value, ()>(Role::StoreOwner, Method::GET, "/api/stores", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired { role: Role::StoreOwner }));
        assert!(client.session().await.store_owner_token.is_none());

        let again = client
            .request::<Value, ()>(Role::StoreOwner, Method::GET, "/api/stores", None)
            .await
            .unwrap_err();
        assert!(matches!(again, ClientError::NotSignedIn { .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_then_succeeds() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        let router = Router::new().route(
            "/api/public/resolve-domain",
            get(|| async {
                if CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
                    (AxumStatus::TOO_MANY_REQUESTS, [("retry-after", "0")], "slow down")
                        .into_response()
                } else {
                    Json(json!({ "success": true, "data": { "slug": "acme" } })).into_response()
                }
            }),
        );
        let base = serve(router).await;
        let client = ApiClient::new(&base, Session::default())
            .unwrap()
            .with_retry(fast_retry());

        let resolved: Value = client
            .request(Role::Public, Method::GET, "/api/public/resolve-domain", None::<&()>)
            .await
            .unwrap();
        assert_eq!(resolved["slug"], "acme");
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted() {
        let router = Router::new().route(
            "/api/x",
            get(|| async { (AxumStatus::TOO_MANY_REQUESTS, [("retry-after", "0")], "") }),
        );
        let base = serve(router).await;
        let client = ApiClient::new(&base, Session::default())
            .unwrap()
            .with_retry(fast_retry());

        let err = client
            .request::<Value, ()>(Role::Public, Method::GET, "/api/x", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::RateLimited { retry_after: Some(d) } if d == Duration::ZERO
        ));
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let router = Router::new().route(
            "/api/x",
            get(|| async {
                (
                    AxumStatus::CONFLICT,
                    Json(json!({ "success": false, "error": "layout is at version 4, not 3; reload and retry" })),
                )
            }),
        );
        let base = serve(router).await;
        let client = ApiClient::new(&base, Session::default()).unwrap();

        let err = client
            .request::<Value, ()>(Role::Public, Method::GET, "/api/x", None)
            .await
            .unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.starts_with("layout is at version 4"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_request_requires_store() {
        let mut session = Session::store_owner("owner", StoreId::new(1));
        session.store_id = None;
        let client = ApiClient::new("http://127.0.0.1:9", session).unwrap();

        let err = client
            .store_request::<Value, ()>(Method::GET, "/api/shipping-methods", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NoStoreSelected));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", Session::default()),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }
}
