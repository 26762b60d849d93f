//! Service layer: authentication, identification, and billing webhooks.

pub mod auth;
pub mod billing;
pub mod vision;
