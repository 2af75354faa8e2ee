//! Stripe billing webhook.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;

use super::{ApiResponse, ApiResult};
use crate::error::AppError;
use crate::services::billing::{WebhookOutcome, handle_event, verify_signature};
use crate::state::AppState;

/// Header carrying Stripe's webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Build the billing router.
pub fn router() -> Router<AppState> {
    Router::new().route("/billing/stripe/webhook", post(stripe_webhook))
}

/// Receive a Stripe event.
///
/// Answers 404 when no webhook secret is configured. The raw body is
/// verified before it is parsed.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookOutcome> {
    let Some(secret) = state.config().stripe_webhook_secret.as_ref() else {
        return Err(AppError::NotFound("billing webhooks are not enabled".to_owned()));
    };

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Stripe-Signature header".to_owned()))?;

    if let Err(e) = verify_signature(signature, &body, secret, Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        return Err(e.into());
    }

    let outcome = handle_event(state.pool(), &body).await?;
    Ok(ApiResponse::ok(outcome))
}
