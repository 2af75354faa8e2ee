//! Shopforge Client - typed HTTP client for the Shopforge API.
//!
//! The caller's identity travels in an explicit [`Session`] handed to
//! [`ApiClient::new`]. Each call names the [`Role`] it acts as, which picks
//! the bearer token; store, language and guest session headers are attached
//! from the session when present.
//!
//! # Error handling
//!
//! - 401/403 clear the acting role's token and return
//!   [`ClientError::SessionExpired`]; the UI treats this as a forced logout.
//! - 429 is retried per [`RetryPolicy`], honouring `Retry-After`.
//! - Both `{ success, data }` envelopes and bare payloads are accepted.
//!
//! ```no_run
//! # async fn run() -> Result<(), shopforge_client::ClientError> {
//! use shopforge_client::{ApiClient, Session};
//! use shopforge_core::StoreId;
//!
//! let session = Session::store_owner("sf_...", StoreId::new(7));
//! let client = ApiClient::new("https://api.shopforge.io", session)?;
//! let layout = client.get_layout("home").await?;
//! println!("home is at version {}", layout.version);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod client;
mod endpoints;
mod error;
pub mod models;
mod response;
mod session;

pub use client::ApiClient;
pub use error::ClientError;
pub use session::{Role, Session};
pub use shopforge_core::retry::RetryPolicy;
