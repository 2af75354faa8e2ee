//! Caller identity and request context.

use secrecy::{ExposeSecret, SecretString};

use shopforge_core::{LanguageCode, StoreId};

/// Which identity a call acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Admin dashboard token (store owner or platform admin).
    StoreOwner,
    /// Storefront customer token.
    Customer,
    /// No credentials.
    Public,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreOwner => write!(f, "store owner"),
            Self::Customer => write!(f, "customer"),
            Self::Public => write!(f, "public"),
        }
    }
}

/// Everything the client needs to know about the caller.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub store_owner_token: Option<SecretString>,
    pub customer_token: Option<SecretString>,
    /// Sent as `x-store-id` on store-scoped calls.
    pub store_id: Option<StoreId>,
    /// Sent as `X-Language`.
    pub language: Option<LanguageCode>,
    /// Guest session, sent as `X-Session-ID`.
    pub session_id: Option<String>,
}

impl Session {
    /// A dashboard session working on one store.
    #[must_use]
    pub fn store_owner(token: impl Into<String>, store_id: StoreId) -> Self {
        Self {
            store_owner_token: Some(SecretString::from(token.into())),
            store_id: Some(store_id),
            ..Self::default()
        }
    }

    /// An anonymous storefront visitor.
    #[must_use]
    pub fn guest(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: LanguageCode) -> Self {
        self.language = Some(language);
        self
    }

    /// Bearer token for `role`; `None` for public calls or when signed out.
    #[must_use]
    pub fn token_for(&self, role: Role) -> Option<&str> {
        let token = match role {
            Role::StoreOwner => self.store_owner_token.as_ref(),
            Role::Customer => self.customer_token.as_ref(),
            Role::Public => None,
        };
        token.map(ExposeSecret::expose_secret)
    }

    /// Forget the token for `role`.
    pub fn clear(&mut self, role: Role) {
        match role {
            Role::StoreOwner => self.store_owner_token = None,
            Role::Customer => self.customer_token = None,
            Role::Public => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_per_role() {
        let mut session = Session::store_owner("owner-token", StoreId::new(3));
        session.customer_token = Some(SecretString::from("customer-token".to_owned()));

        assert_eq!(session.token_for(Role::StoreOwner), Some("owner-token"));
        assert_eq!(session.token_for(Role::Customer), Some("customer-token"));
        assert_eq!(session.token_for(Role::Public), None);

        session.clear(Role::Customer);
        assert_eq!(session.token_for(Role::Customer), None);
        assert_eq!(session.token_for(Role::StoreOwner), Some("owner-token"));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let session = Session::store_owner("owner-token", StoreId::new(3));
        assert!(!format!("{session:?}").contains("owner-token"));
    }
}
