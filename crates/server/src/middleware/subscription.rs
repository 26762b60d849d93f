//! Subscription gating extractor.
//!
//! Applies the shared access-check predicate per request: the session
//! identifies the account, the account row is re-read, and the effective
//! status is computed fresh. The stored status column is never trusted on
//! its own, so a trial that lapsed a second ago is denied here even though
//! no sweep ever wrote `expired` back.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::middleware::auth::RequireUser;
use crate::models::user::User;
use crate::state::AppState;

/// Extractor that requires a logged-in user whose effective subscription
/// status allows access.
///
/// Rejections: 401 when nobody is logged in, the typed
/// `subscription_required` response when the account has lapsed.
///
/// # Example
///
/// ```rust,ignore
/// async fn gated_handler(
///     RequireSubscriber(user): RequireSubscriber,
/// ) -> impl IntoResponse {
///     format!("{} may identify items", user.email)
/// }
/// ```
pub struct RequireSubscriber(pub User);

impl FromRequestParts<AppState> for RequireSubscriber {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(current) = RequireUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let users = UserRepository::new(state.pool());
        let user = users
            .get_by_id(current.id)
            .await
            .map_err(|e| AppError::Database(e).into_response())?
            .ok_or_else(|| {
                AppError::Unauthorized("account no longer exists".to_owned()).into_response()
            })?;

        let status = user.effective_status(Utc::now());
        if !status.allows_access() {
            tracing::info!(user_id = %user.id, %status, "gated request denied");
            return Err(AppError::SubscriptionRequired.into_response());
        }

        Ok(Self(user))
    }
}
