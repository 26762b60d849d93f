//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use quicklist_core::{Email, EffectiveStatus, SubscriptionStatus, UserId};

/// A QuickList account (domain type).
///
/// Accounts are never hard-deleted; their lifecycle runs through
/// `subscription_status`.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Stored subscription status (see [`User::effective_status`]).
    pub subscription_status: SubscriptionStatus,
    /// End of the unpaid trial window.
    pub trial_end: DateTime<Utc>,
    /// End of the current paid billing period, when one exists.
    pub period_end: Option<DateTime<Utc>>,
    /// External payment-customer reference, once checkout has completed.
    pub stripe_customer_id: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Resolve the effective subscription status at `now`.
    ///
    /// Thin shim over the shared predicate so call sites never reimplement
    /// the lazy-expiry rule.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        self.subscription_status
            .effective(self.trial_end, self.period_end, now)
    }
}
