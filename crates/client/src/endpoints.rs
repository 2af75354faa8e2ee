//! Typed wrappers for the routes the dashboard and storefront use.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use shopforge_core::CustomDomainId;
use shopforge_core::slots::{Slot, SlotConfiguration, SlotId, SlotOperation};
use shopforge_core::translations::NormalizationReport;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::{CustomDomain, Job, Layout, ShippingMethod};
use crate::session::Role;

/// Percent-encode one path segment.
fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveLayoutBody<'a> {
    slots: &'a BTreeMap<SlotId, Slot>,
    metadata: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationsBody<'a> {
    operations: &'a [SlotOperation],
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<i32>,
}

impl ApiClient {
    // =========================================================================
    // Slot configurations
    // =========================================================================

    /// Current layout of a page; version 0 if never saved.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get_layout(&self, page_type: &str) -> Result<Layout, ClientError> {
        let path = format!("/api/slot-configurations/{}", segment(page_type));
        self.store_request(Method::GET, &path, None::<&()>).await
    }

    /// Replace a page layout.
    ///
    /// Pass the version the editor loaded as `expected_version`; a concurrent
    /// save makes the API answer 409.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn save_layout(
        &self,
        configuration: &SlotConfiguration,
        expected_version: Option<i32>,
    ) -> Result<Layout, ClientError> {
        let path = format!(
            "/api/slot-configurations/{}",
            segment(&configuration.page_type)
        );
        let body = SaveLayoutBody {
            slots: &configuration.slots,
            metadata: &configuration.metadata,
            expected_version,
        };
        self.store_request(Method::PUT, &path, Some(&body)).await
    }

    /// Apply editor operations server-side; all or nothing.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn apply_operations(
        &self,
        page_type: &str,
        operations: &[SlotOperation],
        expected_version: Option<i32>,
    ) -> Result<Layout, ClientError> {
        let path = format!("/api/slot-configurations/{}/operations", segment(page_type));
        let body = OperationsBody {
            operations,
            expected_version,
        };
        self.store_request(Method::POST, &path, Some(&body)).await
    }

    /// Published layout as storefront visitors see it.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn public_layout(&self, store_slug: &str, page_type: &str) -> Result<Layout, ClientError> {
        let path = format!(
            "/api/public/stores/{}/layout/{}",
            segment(store_slug),
            segment(page_type)
        );
        self.request(Role::Public, Method::GET, &path, None::<&()>)
            .await
    }

    // =========================================================================
    // Shipping
    // =========================================================================

    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list_shipping_methods(
        &self,
        active_only: bool,
    ) -> Result<Vec<ShippingMethod>, ClientError> {
        let path = format!("/api/shipping-methods?active_only={active_only}");
        self.store_request(Method::GET, &path, None::<&()>).await
    }

    // =========================================================================
    // Domains
    // =========================================================================

    /// Register a custom domain; publish the returned DNS records next.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn add_domain(&self, domain: &str) -> Result<CustomDomain, ClientError> {
        let body = serde_json::json!({ "domain": domain });
        self.store_request(Method::POST, "/api/domains", Some(&body))
            .await
    }

    /// Ask the API to check the verification TXT record now.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn verify_domain(&self, id: CustomDomainId) -> Result<CustomDomain, ClientError> {
        let path = format!("/api/domains/{id}/verify");
        self.store_request(Method::POST, &path, None::<&()>).await
    }

    // =========================================================================
    // Maintenance jobs
    // =========================================================================

    /// Start translation normalization in the background (platform admins).
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn normalize_translations(
        &self,
        target: Option<&str>,
        dry_run: bool,
    ) -> Result<Job, ClientError> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("async", "true");
        query.append_pair("dry_run", if dry_run { "true" } else { "false" });
        if let Some(target) = target {
            query.append_pair("target", target);
        }
        let path = format!("/api/admin/translations/normalize?{}", query.finish());
        self.request(Role::StoreOwner, Method::POST, &path, None::<&()>)
            .await
    }

    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get_job(&self, id: Uuid) -> Result<Job, ClientError> {
        let path = format!("/api/jobs/{id}");
        self.request(Role::StoreOwner, Method::GET, &path, None::<&()>)
            .await
    }

    /// Poll a job every `interval` until it completes or fails.
    ///
    /// A failed job is returned as-is; check `status` and `error`.
    ///
    /// # Errors
    ///
    /// Returns `JobTimeout` if the job is still running after `timeout`.
    pub async fn poll_job(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Job, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            let job = self.get_job(id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if Instant::now() + interval > deadline {
                return Err(ClientError::JobTimeout { id, timeout });
            }
            tracing::debug!(job_id = %id, progress = %job.progress, "Job still running");
            tokio::time::sleep(interval).await;
        }
    }

    /// Reports of a finished normalization job.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the job has no result or it is not a report list.
    pub fn normalization_reports(job: &Job) -> Result<Vec<NormalizationReport>, ClientError> {
        let result = job
            .result
            .clone()
            .ok_or_else(|| ClientError::Decode(format!("job {} has no result", job.id)))?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{
        Json, Router,
        extract::{Path, RawQuery},
        routing::{get, post, put},
    };
    use serde_json::json;

    use shopforge_core::{JobStatus, StoreId};

    use super::*;
    use crate::session::Session;

    async fn serve(router: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        ApiClient::new(&format!("http://{addr}"), Session::store_owner("owner", StoreId::new(2)))
            .unwrap()
    }

    fn job_json(status: &str, result: Value) -> Value {
        json!({
            "success": true,
            "data": {
                "id": "6f1c2a8e-3b7d-4e0f-9a51-2c8d7e6b4a10",
                "kind": "translations.normalize",
                "status": status,
                "progress": { "completed": 0, "total": 1 },
                "result": result,
                "error": null,
                "created_at": "2026-03-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("home"), "home");
        assert_eq!(segment("a/b"), "a%2Fb");
    }

    #[tokio::test]
    async fn test_save_layout_body() {
        let router = Router::new().route(
            "/api/slot-configurations/{page_type}",
            put(|Path(page_type): Path<String>, Json(body): Json<Value>| async move {
                assert_eq!(body["expectedVersion"], 4);
                assert!(body["slots"].is_object());
                Json(json!({
                    "success": true,
                    "data": { "pageType": page_type, "slots": {}, "version": 5, "updated_at": null }
                }))
            }),
        );
        let client = serve(router).await;

        let layout = client
            .save_layout(&SlotConfiguration::empty("home"), Some(4))
            .await
            .unwrap();
        assert_eq!(layout.version, 5);
        assert_eq!(layout.configuration.page_type, "home");
    }

    #[tokio::test]
    async fn test_apply_operations_body() {
        let router = Router::new().route(
            "/api/slot-configurations/{page_type}/operations",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["operations"][0]["op"], "delete");
                assert!(body.get("expectedVersion").is_none());
                Json(json!({ "success": true, "data": { "pageType": "cart", "version": 2 } }))
            }),
        );
        let client = serve(router).await;

        let ops = [SlotOperation::Delete {
            id: SlotId::new("slot_1"),
        }];
        let layout = client.apply_operations("cart", &ops, None).await.unwrap();
        assert_eq!(layout.version, 2);
        assert!(layout.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_normalize_query_and_poll() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&polls);
        let router = Router::new()
            .route(
                "/api/admin/translations/normalize",
                post(|RawQuery(query): RawQuery| async move {
                    let query = query.unwrap_or_default();
                    assert!(query.contains("async=true"));
                    assert!(query.contains("dry_run=true"));
                    assert!(query.contains("target=product_seo"));
                    Json(job_json("queued", Value::Null))
                }),
            )
            .route(
                "/api/jobs/{id}",
                get(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Json(job_json("running", Value::Null))
                        } else {
                            Json(job_json(
                                "completed",
                                json!([{
                                    "target": "product_seo",
                                    "entities_scanned": 3,
                                    "rows_inserted": 5,
                                    "rows_skipped": 1,
                                    "warnings": []
                                }]),
                            ))
                        }
                    }
                }),
            );
        let client = serve(router).await;

        let job = client
            .normalize_translations(Some("product_seo"), true)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let done = client
            .poll_job(job.id, Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(polls.load(Ordering::SeqCst), 2);

        let reports = ApiClient::normalization_reports(&done).unwrap();
        assert_eq!(reports[0].rows_inserted, 5);
    }

    #[tokio::test]
    async fn test_poll_job_times_out() {
        let router = Router::new().route(
            "/api/jobs/{id}",
            get(|| async { Json(job_json("running", Value::Null)) }),
        );
        let client = serve(router).await;

        let id = Uuid::new_v4();
        let err = client
            .poll_job(id, Duration::from_millis(20), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::JobTimeout { id: timed_out, .. } if timed_out == id));
    }
}
