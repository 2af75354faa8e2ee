//! Stripe webhook ingress: signature verification and billing status sync.
//!
//! Only subscription lifecycle events are acted on. Every event is recorded
//! by its Stripe id first, so redeliveries are acknowledged without being
//! processed twice.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use shopforge_core::BillingStatus;

use crate::db::{AppliedEvent, BillingRepository, RepositoryError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Errors from webhook handling.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("invalid Stripe signature: {0}")]
    InvalidSignature(String),

    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// # Errors
///
/// Returns `BillingError::InvalidSignature` if the header is malformed or no
/// `v1` signature matches, or `BillingError::StaleTimestamp` if `t` is more
/// than five minutes from `now`.
#[instrument(skip(header, payload, secret))]
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &SecretString,
    now: i64,
) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| BillingError::InvalidSignature("invalid timestamp".to_string()))?;
    if now.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(BillingError::StaleTimestamp);
    }
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| BillingError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if matched {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

/// The fields of a Stripe event this service reads.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// What happened to a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Already processed.
    Duplicate,
    /// Not a subscription event, or no store matches the customer.
    Ignored,
    /// Stores matching the customer moved to `status`.
    Updated { status: BillingStatus, stores: u64 },
}

/// Subscription status carried by a `customer.subscription.*` event.
///
/// Returns `(stripe_customer_id, status)`, or `None` for other events.
///
/// # Errors
///
/// Returns `BillingError::InvalidPayload` if a subscription event lacks the
/// customer or has an unknown status.
pub fn subscription_update(
    event: &StripeEvent,
) -> Result<Option<(String, BillingStatus)>, BillingError> {
    let Some(kind) = event.event_type.strip_prefix("customer.subscription.") else {
        return Ok(None);
    };

    let object = &event.data.object;
    let customer = object
        .get("customer")
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::InvalidPayload("subscription without customer".to_string()))?;

    let status = if kind == "deleted" {
        BillingStatus::Canceled
    } else {
        let raw = object
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| BillingError::InvalidPayload("subscription without status".to_string()))?;
        BillingStatus::from_stripe(raw)
            .ok_or_else(|| BillingError::InvalidPayload(format!("unknown status '{raw}'")))?
    };

    Ok(Some((customer.to_owned(), status)))
}

/// Record and apply a verified event.
///
/// # Errors
///
/// Returns `BillingError` if the payload is invalid or a write fails.
#[instrument(skip(pool, payload), fields(event_id))]
pub async fn handle_event(pool: &PgPool, payload: &[u8]) -> Result<WebhookOutcome, BillingError> {
    let raw: Value =
        serde_json::from_slice(payload).map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
    let event: StripeEvent = serde_json::from_value(raw.clone())
        .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
    tracing::Span::current().record("event_id", event.id.as_str());

    let update = subscription_update(&event)?;

    let applied = BillingRepository::new(pool)
        .apply_event(
            &event.id,
            &event.event_type,
            &raw,
            update.as_ref().map(|(customer, status)| (customer.as_str(), *status)),
        )
        .await?;

    let stores = match applied {
        AppliedEvent::Duplicate => {
            tracing::debug!("Duplicate Stripe event");
            return Ok(WebhookOutcome::Duplicate);
        }
        AppliedEvent::Recorded { stores } => stores,
    };

    let Some((_, status)) = update else {
        return Ok(WebhookOutcome::Ignored);
    };
    if stores == 0 {
        tracing::warn!(event_type = %event.event_type, "No store for Stripe customer");
        return Ok(WebhookOutcome::Ignored);
    }

    tracing::info!(status = ?status, stores, "Updated billing status");
    Ok(WebhookOutcome::Updated { status, stores })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).expect("valid key length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(now, payload));
        let secret = SecretString::from(SECRET);

        assert!(verify_signature(&header, payload, &secret, now + 10).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = format!("t={now},v1=deadbeef,v0=ignored,v1={}", sign(now, payload));
        let secret = SecretString::from(SECRET);

        assert!(verify_signature(&header, payload, &secret, now).is_ok());
    }

    #[test]
    fn test_rejects_tampering_and_replay() {
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(now, payload));
        let secret = SecretString::from(SECRET);

        assert!(matches!(
            verify_signature(&header, br#"{"id":"evt_2"}"#, &secret, now),
            Err(BillingError::InvalidSignature(_))
        ));
        assert!(matches!(
            verify_signature(&header, payload, &secret, now + 301),
            Err(BillingError::StaleTimestamp)
        ));
        assert!(matches!(
            verify_signature("v1=abc", payload, &secret, now),
            Err(BillingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let secret = SecretString::from(SECRET);
        let now = 1_700_000_000;

        for ts in [i64::MIN, i64::MAX] {
            let header = format!("t={ts},v1=00");
            assert!(matches!(
                verify_signature(&header, b"{}", &secret, now),
                Err(BillingError::StaleTimestamp)
            ));
        }
        assert!(matches!(
            verify_signature("t=0,v1=00", b"{}", &secret, i64::MIN),
            Err(BillingError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_subscription_update() {
        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {"object": {"customer": "cus_1", "status": "past_due"}}
        }))
        .unwrap();
        assert_eq!(
            subscription_update(&event).unwrap(),
            Some(("cus_1".to_owned(), BillingStatus::PastDue))
        );

        let deleted: StripeEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "customer.subscription.deleted",
            "data": {"object": {"customer": "cus_1", "status": "active"}}
        }))
        .unwrap();
        assert_eq!(
            subscription_update(&deleted).unwrap(),
            Some(("cus_1".to_owned(), BillingStatus::Canceled))
        );

        let other: StripeEvent = serde_json::from_value(json!({
            "id": "evt_3",
            "type": "invoice.paid",
            "data": {"object": {}}
        }))
        .unwrap();
        assert_eq!(subscription_update(&other).unwrap(), None);
    }
}
