//! QuickList Core - Shared types library.
//!
//! This crate provides common types used across all QuickList components:
//! - `server` - Public-facing web API (identification, accounts, billing webhooks)
//! - `catalog` - Catalog store, sync job, and matching-index publisher
//! - `cli` - Command-line tools for migrations and catalog operations
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, product codes, emails,
//!   price comparables, and the subscription access-check predicate

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
