//! Authentication route handlers.
//!
//! JSON register/login/logout. Registration is where an account's trial
//! window starts; both register and login establish the session cookie.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use quicklist_core::SubscriptionStatus;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::services::auth::AuthService;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account summary returned after register/login.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: i32,
    pub email: String,
    pub subscription_status: SubscriptionStatus,
    pub trial_end: DateTime<Utc>,
}

impl From<&User> for AccountSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_i32(),
            email: user.email.to_string(),
            subscription_status: user.subscription_status,
            trial_end: user.trial_end,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle registration.
///
/// Creates the account in the trial state and logs the new user in.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.pool());
    let user = auth.register(&req.email, &req.password).await?;

    establish_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, trial_end = %user.trial_end, "account created");

    Ok((StatusCode::CREATED, Json(AccountSummary::from(&user))))
}

/// Handle login.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.pool());
    let user = auth.login(&req.email, &req.password).await?;

    establish_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, "login");

    Ok(Json(AccountSummary::from(&user)))
}

/// Handle logout.
pub async fn logout(session: Session) -> Result<impl IntoResponse> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// Store the user identity in the session and tag Sentry scope.
async fn establish_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
    };
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("failed to write session: {e}")))?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}
