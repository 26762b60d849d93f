//! Subscription status and the access-check predicate.
//!
//! The stored status is only trustworthy up to its boundary timestamp: a
//! `trial` row is really expired once `trial_end` passes, and an `active`
//! row is really expired once `period_end` passes without a renewal event.
//! [`SubscriptionStatus::effective`] is the single place that rule lives;
//! every gate in the system goes through it rather than reading the stored
//! column directly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the unpaid trial window granted at signup, in days.
pub const TRIAL_WINDOW_DAYS: i64 = 3;

/// The trial window as a [`chrono::Duration`].
#[must_use]
pub fn trial_window() -> Duration {
    Duration::days(TRIAL_WINDOW_DAYS)
}

/// Stored subscription status for an account.
///
/// This is the value persisted in the database. It is written at signup
/// (`Trial`) and by verified payment-provider webhook events (`Active`,
/// `Canceled`); the time-based `Expired` state is normally *derived* at
/// access-check time rather than written back.
///
/// Stored as TEXT in the database; repositories convert via
/// [`std::fmt::Display`]/[`std::str::FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Unpaid trial window after signup.
    Trial,
    /// Paid subscription with a known billing period.
    Active,
    /// Subscription canceled by a provider event.
    Canceled,
    /// Trial or billing period ran out without renewal.
    Expired,
}

impl SubscriptionStatus {
    /// Resolve the effective status for an account at `now`.
    ///
    /// Lazy expiry: the stored status is reinterpreted against its boundary
    /// timestamps instead of trusting it past them. Nothing is persisted
    /// here; only webhook events write status back.
    ///
    /// - `Trial` past `trial_end` resolves to `Expired`.
    /// - `Active` past a known `period_end` resolves to `Expired` (no
    ///   renewal event arrived). An `Active` row with no recorded
    ///   `period_end` stays active until an event says otherwise.
    /// - `Canceled` and `Expired` stay as they are; only a new successful
    ///   payment event re-enters `Active`.
    #[must_use]
    pub fn effective(
        self,
        trial_end: DateTime<Utc>,
        period_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> EffectiveStatus {
        match self {
            Self::Trial => {
                if now > trial_end {
                    EffectiveStatus::Expired
                } else {
                    EffectiveStatus::Trial
                }
            }
            Self::Active => match period_end {
                Some(end) if now > end => EffectiveStatus::Expired,
                _ => EffectiveStatus::Active,
            },
            Self::Canceled => EffectiveStatus::Canceled,
            Self::Expired => EffectiveStatus::Expired,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trial => write!(f, "trial"),
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid subscription status: {s}")),
        }
    }
}

/// Status after applying the lazy-expiry rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Trial,
    Active,
    Canceled,
    Expired,
}

impl EffectiveStatus {
    /// The access-check predicate: may this account use gated features?
    #[must_use]
    pub const fn allows_access(self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }
}

impl std::fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trial => write!(f, "trial"),
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_trial_window_is_three_days() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let trial_end = created + trial_window();
        assert_eq!(trial_end, Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_trial_allowed_before_boundary() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let eff = SubscriptionStatus::Trial.effective(trial_end, None, at("2024-01-03T23:59:00Z"));
        assert_eq!(eff, EffectiveStatus::Trial);
        assert!(eff.allows_access());
    }

    #[test]
    fn test_trial_allowed_exactly_at_boundary() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let eff = SubscriptionStatus::Trial.effective(trial_end, None, trial_end);
        assert!(eff.allows_access());
    }

    #[test]
    fn test_trial_denied_after_boundary() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let eff = SubscriptionStatus::Trial.effective(trial_end, None, at("2024-01-04T00:00:01Z"));
        assert_eq!(eff, EffectiveStatus::Expired);
        assert!(!eff.allows_access());

        let eff = SubscriptionStatus::Trial.effective(trial_end, None, at("2024-01-04T00:01:00Z"));
        assert_eq!(eff, EffectiveStatus::Expired);
    }

    #[test]
    fn test_active_within_period() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let period_end = Some(at("2024-02-01T00:00:00Z"));
        let eff =
            SubscriptionStatus::Active.effective(trial_end, period_end, at("2024-01-20T12:00:00Z"));
        assert_eq!(eff, EffectiveStatus::Active);
    }

    #[test]
    fn test_active_past_period_without_renewal() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let period_end = Some(at("2024-02-01T00:00:00Z"));
        let eff =
            SubscriptionStatus::Active.effective(trial_end, period_end, at("2024-02-01T00:00:01Z"));
        assert_eq!(eff, EffectiveStatus::Expired);
        assert!(!eff.allows_access());
    }

    #[test]
    fn test_active_with_unknown_period_end_stays_active() {
        let trial_end = at("2024-01-04T00:00:00Z");
        let eff = SubscriptionStatus::Active.effective(trial_end, None, at("2030-01-01T00:00:00Z"));
        assert_eq!(eff, EffectiveStatus::Active);
    }

    #[test]
    fn test_terminal_states_deny_access() {
        let trial_end = at("2024-01-04T00:00:00Z");
        assert!(
            !SubscriptionStatus::Canceled
                .effective(trial_end, None, at("2024-01-02T00:00:00Z"))
                .allows_access()
        );
        assert!(
            !SubscriptionStatus::Expired
                .effective(trial_end, None, at("2024-01-02T00:00:00Z"))
                .allows_access()
        );
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            SubscriptionStatus::Trial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Expired,
        ] {
            let s = status.to_string();
            assert_eq!(s.parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("premium".parse::<SubscriptionStatus>().is_err());
    }
}
