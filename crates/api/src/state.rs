//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{DnsResolver, DohResolver, JobRunner, LayoutCache, VerificationError};

/// Application state shared across all handlers.
///
/// Cheap to clone; every handle lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    resolver: Arc<dyn DnsResolver>,
    layouts: LayoutCache,
    jobs: JobRunner,
}

impl AppState {
    /// Create state backed by the configured DNS-over-HTTPS resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolver's HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, VerificationError> {
        let resolver = DohResolver::new(&config.dns_resolver_url)?;
        Ok(Self::with_resolver(config, pool, Arc::new(resolver)))
    }

    /// Create state with an explicit resolver (tests use a static one).
    #[must_use]
    pub fn with_resolver(config: ApiConfig, pool: PgPool, resolver: Arc<dyn DnsResolver>) -> Self {
        let jobs = JobRunner::new(pool.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                resolver,
                layouts: LayoutCache::new(),
                jobs,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Resolver used for custom domain TXT checks.
    #[must_use]
    pub fn resolver(&self) -> &dyn DnsResolver {
        self.inner.resolver.as_ref()
    }

    /// Published layouts keyed by `(store slug, page type)`.
    #[must_use]
    pub fn layouts(&self) -> &LayoutCache {
        &self.inner.layouts
    }

    #[must_use]
    pub fn jobs(&self) -> &JobRunner {
        &self.inner.jobs
    }
}
