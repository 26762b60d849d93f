//! Core types for QuickList.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod code;
pub mod email;
pub mod id;
pub mod price;
pub mod subscription;

pub use code::{ProductCode, ProductCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::PriceComps;
pub use subscription::{EffectiveStatus, SubscriptionStatus, TRIAL_WINDOW_DAYS, trial_window};
