//! Client errors.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::session::Role;

/// Errors returned by [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The API rejected the credentials for `role`; its token was cleared.
    #[error("session expired for {role}")]
    SessionExpired { role: Role },

    /// The role has no token in the session.
    #[error("not signed in as {role}")]
    NotSignedIn { role: Role },

    /// A store-scoped call was made without a store selected.
    #[error("no store selected")]
    NoStoreSelected,

    /// Still rate limited after every retry.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The API answered with an error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A success response did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A polled job did not finish in time.
    #[error("job {id} did not finish within {timeout:?}")]
    JobTimeout { id: Uuid, timeout: Duration },
}

impl ClientError {
    /// Whether the UI should send the user back to sign-in.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. } | Self::NotSignedIn { .. })
    }
}
