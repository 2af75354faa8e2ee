//! Shopforge Core - Shared domain types and algorithms.
//!
//! This crate provides the tenant-independent building blocks used across all
//! Shopforge components:
//! - `api` - Multi-tenant REST API (admin dashboard + public storefront)
//! - `client` - Typed HTTP client for the API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Every mutation takes the current value and returns
//! a new one; callers decide when to persist.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, domain names, language codes, money, statuses
//! - [`slots`] - Page-layout slot trees and their editing operations
//! - [`history`] - Snapshot/patch version history for JSON documents
//! - [`shipping`] - Typed shipping methods and rate quoting
//! - [`translations`] - JSON-blob to per-language row normalization
//! - [`plugins`] - Plugin manifests and source documents
//! - [`retry`] - Exponential backoff policy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod history;
pub mod plugins;
pub mod retry;
pub mod shipping;
pub mod slots;
pub mod translations;
pub mod types;

pub use types::*;
