//! Integration tests for QuickList AI.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and run migrations
//! docker compose up -d postgres
//! cargo run -p quicklist-cli -- migrate
//!
//! # Start the server
//! cargo run -p quicklist-server
//!
//! # Run integration tests (ignored by default)
//! cargo test -p quicklist-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `health` - Liveness/readiness endpoints
//! - `auth_gating` - Registration, login, and subscription gating
//! - `webhooks` - Webhook signature rejection and idempotency
//! - `catalog_sync` - Upsert idempotence against a live database

/// Base URL for the server under test (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("QUICKLIST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Create an HTTP client with a cookie store for session-based tests.
///
/// # Panics
///
/// Panics if the client cannot be constructed (test-only code).
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique email for this test run, so re-runs don't collide on the
/// account table's unique constraint.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{prefix}+{nanos}@integration.test")
}
