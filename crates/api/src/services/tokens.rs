//! API token generation and issuance.
//!
//! Tokens are 32 random bytes, base64url-encoded and prefixed with `sf_`.
//! Only `sha256(pepper || token)` is stored, so a database leak does not
//! yield usable tokens without the pepper.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;

use shopforge_core::{ApiRole, ApiTokenId, UserId};

use crate::db::{ApiTokenRepository, RepositoryError, UserRepository};

/// Prefix of every issued token, for secret scanners.
pub const TOKEN_PREFIX: &str = "sf_";

/// Longest validity a token may be issued with.
pub const MAX_VALID_DAYS: i64 = 3650;

/// Errors issuing a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Validity outside `1..=MAX_VALID_DAYS`.
    #[error("token validity must be between 1 and {MAX_VALID_DAYS} days, got {0}")]
    InvalidValidity(i64),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A freshly issued token. The plaintext is shown once and never stored.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: ApiTokenId,
    pub user_id: UserId,
    pub role: ApiRole,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Generate a new plaintext token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a presented token for lookup.
#[must_use]
pub fn hash_token(pepper: &SecretString, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pepper.expose_secret().as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Expiry `days` after `now`, or `None` when `days` is outside
/// `1..=MAX_VALID_DAYS`.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    if !(1..=MAX_VALID_DAYS).contains(&days) {
        return None;
    }
    now.checked_add_signed(Duration::try_days(days)?)
}

/// Issue a token for the user with `email`, creating the user if needed.
///
/// # Errors
///
/// Returns `TokenError::InvalidValidity` for an out-of-range `valid_days`,
/// or `TokenError::Repository` if the user or token cannot be stored.
pub async fn issue(
    pool: &PgPool,
    pepper: &SecretString,
    email: &str,
    role: ApiRole,
    label: Option<&str>,
    valid_days: Option<i64>,
) -> Result<IssuedToken, TokenError> {
    let expires_at = valid_days
        .map(|days| expiry_after(Utc::now(), days).ok_or(TokenError::InvalidValidity(days)))
        .transpose()?;

    let user = UserRepository::new(pool).get_or_create(email, "").await?;
    let token = generate_token();
    let stored = ApiTokenRepository::new(pool)
        .create(user.id, role, &hash_token(pepper, &token), label, expires_at)
        .await?;

    tracing::info!(
        user_id = %user.id,
        token_id = %stored.id,
        role = %role,
        "Issued API token"
    );

    Ok(IssuedToken {
        token,
        token_id: stored.id,
        user_id: user.id,
        role,
        expires_at,
    })
}
