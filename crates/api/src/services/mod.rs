//! Business logic services for the API.
//!
//! # Services
//!
//! - `tokens` - API token generation, hashing and issuance
//! - `domain_verification` - DNS TXT ownership checks for custom domains
//! - `jobs` - Background job runner with status recorded for polling
//! - `translations` - Normalization of translation blobs into rows
//! - `billing` - Stripe webhook verification and billing status sync
//! - `layout_cache` - Cache of published layouts for the public storefront

pub mod billing;
pub mod domain_verification;
pub mod jobs;
pub mod layout_cache;
pub mod tokens;
pub mod translations;

pub use domain_verification::{DnsResolver, DohResolver, VerificationError};
pub use jobs::{JobError, JobRunner};
pub use layout_cache::LayoutCache;
