//! HTTP middleware and request extractors.
//!
//! # Middleware Order (outermost first, see `main.rs`)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (records request and session ids on the span)
//! 4. CORS
//! 5. Rate limiting on `/api` (governor)
//!
//! Authentication is not a layer: handlers opt in through extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod store_context;

pub use auth::{AuthRejection, OptionalAuth, RequireAuth, RequirePlatformAdmin, RequireStoreOwner};
pub use rate_limit::api_rate_limiter;
pub use request_id::request_id_middleware;
pub use store_context::{RequestLanguage, StoreContext};
