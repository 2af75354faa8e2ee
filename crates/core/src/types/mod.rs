//! Core types for Shopforge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod domain;
pub mod id;
pub mod language;
pub mod price;
pub mod status;

pub use domain::{DomainName, DomainNameError};
pub use id::*;
pub use language::{LanguageCode, LanguageCodeError};
pub use price::{CurrencyCode, Money};
pub use status::*;
