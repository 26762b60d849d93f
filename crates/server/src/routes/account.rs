//! Account route handlers.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use quicklist_core::{EffectiveStatus, SubscriptionStatus};

use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::RequireUser;
use crate::state::AppState;

/// Subscription state as reported to the front end.
///
/// Both the stored and the effective status are exposed: the stored value
/// is what the last event wrote, the effective value is what gating
/// actually uses right now.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub status: SubscriptionStatus,
    pub effective_status: EffectiveStatus,
    pub allows_access: bool,
    pub trial_end: DateTime<Utc>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Report the current account's subscription state.
///
/// Drives the front end's paywall UI: when `allows_access` is false the
/// page redirects to the subscription page.
pub async fn subscription(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<SubscriptionView>> {
    let users = UserRepository::new(state.pool());
    let user = users
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_owned()))?;

    let effective = user.effective_status(Utc::now());

    Ok(Json(SubscriptionView {
        status: user.subscription_status,
        effective_status: effective,
        allows_access: effective.allows_access(),
        trial_end: user.trial_end,
        period_end: user.period_end,
    }))
}
