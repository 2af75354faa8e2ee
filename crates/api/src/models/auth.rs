//! Callers, tokens, and the authenticated principal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopforge_core::{ApiRole, ApiTokenId, UserId};

/// A platform user (store owner, customer, or operator).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An issued API token. The secret itself is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ApiToken {
    pub id: ApiTokenId,
    pub user_id: UserId,
    pub role: ApiRole,
    pub label: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: ApiRole,
    pub token_id: ApiTokenId,
}

impl Principal {
    #[must_use]
    pub fn is_platform_admin(&self) -> bool {
        self.role == ApiRole::PlatformAdmin
    }

    /// Store owners and platform admins may manage stores.
    #[must_use]
    pub fn can_manage_stores(&self) -> bool {
        matches!(self.role, ApiRole::StoreOwner | ApiRole::PlatformAdmin)
    }
}
