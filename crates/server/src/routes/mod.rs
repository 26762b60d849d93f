//! HTTP route handlers for the server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (verifies database)
//!
//! # Auth
//! POST /auth/register          - Create account (starts trial)
//! POST /auth/login             - Login, sets session cookie
//! POST /auth/logout            - Logout
//!
//! # Identification (requires active trial/subscription)
//! POST /api/identify           - Multipart image upload -> ranked catalog matches
//!
//! # Account
//! GET  /account/subscription   - Stored + effective subscription status
//!
//! # Webhooks
//! POST /webhooks/stripe        - Signed payment-provider events
//! ```

pub mod account;
pub mod auth;
pub mod billing;
pub mod identify;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
}

/// Create the identification API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/identify", post(identify::identify))
        // Multipart overhead on top of the image cap is small; reject
        // oversized bodies before buffering them.
        .layer(DefaultBodyLimit::max(identify::MAX_UPLOAD_BYTES + 64 * 1024))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/account/subscription", get(account::subscription))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(billing::stripe_webhook))
}

/// Create the combined application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(api_routes())
        .merge(account_routes())
        .merge(webhook_routes())
}
