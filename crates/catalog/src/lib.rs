//! QuickList Catalog - catalog store and sync pipeline.
//!
//! This crate owns everything about the product catalog:
//!
//! - [`store`] - the relational catalog store (`product` table) and its
//!   repository. Rows are written only by the sync job; the web server
//!   reads them when resolving identification candidates.
//! - [`source`] - the external product-data source seam: the
//!   [`source::ProductSource`] trait, the transient/permanent error
//!   taxonomy, and the HTTP market-feed client.
//! - [`sync`] - the offline batch job: sequential term loop, bounded
//!   backoff on transient failures, courtesy delays, upsert semantics,
//!   and the run summary.
//! - [`index`] - the matching-index publisher that keeps the external
//!   embedding index aligned with catalog rows after a sync.
//!
//! The sync job is deliberately non-concurrent: one term at a time, one
//! committed row at a time, so a failure in any term never takes down the
//! rest of the batch.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod index;
pub mod model;
pub mod source;
pub mod store;
pub mod sync;

pub use config::{CatalogConfig, ConfigError, IndexConfig, MarketFeedConfig};
pub use index::{IndexError, MatchIndexClient};
pub use model::{Product, SourceRecord};
pub use source::{MarketFeedClient, ProductSource, SourceError};
pub use store::{ProductRepository, RepositoryError, UpsertOutcome, create_pool};
pub use sync::{SyncConfig, SyncReport, SyncRunner};
