//! Integration tests for Shopforge.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopforge-integration-tests
//! ```
//!
//! No database is needed: the API router is built over a lazily-connected
//! pool that points at a closed port, so only paths that answer before
//! touching `PostgreSQL` are exercised by default.
//!
//! Repository tests in `database` need a scratch database and are ignored
//! unless asked for:
//!
//! ```bash
//! SHOPFORGE_TEST_DATABASE_URL=postgres://localhost/shopforge_test \
//!     cargo test -p shopforge-integration-tests --test database -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_router` - Routing, auth rejection and error envelopes
//! - `client_api` - `shopforge-client` against the real router
//! - `layout_history` - Slot editing and version history together
//! - `database` - Repository invariants against `PostgreSQL`

use std::sync::Arc;

use axum::Router;
use shopforge_api::config::ApiConfig;
use shopforge_api::db;
use shopforge_api::services::{DnsResolver, VerificationError};
use shopforge_api::state::AppState;

/// Resolver that never finds a record.
pub struct EmptyResolver;

#[async_trait::async_trait]
impl DnsResolver for EmptyResolver {
    async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, VerificationError> {
        Ok(Vec::new())
    }
}

/// Application state over a pool that never connects.
///
/// # Panics
///
/// Panics if the hard-coded database URL does not parse.
#[must_use]
pub fn test_state(configure: impl FnOnce(&mut ApiConfig)) -> AppState {
    let mut config = ApiConfig::for_tests("postgres://shopforge@127.0.0.1:1/shopforge");
    configure(&mut config);
    #[allow(clippy::expect_used)]
    let pool = db::create_lazy_pool(&config.database_url).expect("valid test database URL");
    AppState::with_resolver(config, pool, Arc::new(EmptyResolver))
}

/// The full router without rate limiting.
#[must_use]
pub fn test_app() -> Router {
    shopforge_api::app(test_state(|_| {}), None)
}
