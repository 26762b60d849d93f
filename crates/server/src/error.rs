//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::billing::BillingError;
use crate::services::vision::VisionError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Catalog store operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] quicklist_catalog::RepositoryError),

    /// Embedding-search call failed.
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Webhook processing failed.
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Subscription has lapsed; gated feature denied.
    #[error("Subscription required")]
    SubscriptionRequired,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Catalog(_) | Self::Internal(_) | Self::Vision(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Catalog(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Vision(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Billing(err) => match err {
                BillingError::SignatureInvalid | BillingError::Payload(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::SubscriptionRequired => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let body = match &self {
            Self::Database(_) | Self::Catalog(_) | Self::Internal(_) => {
                serde_json::json!({ "error": "Internal server error" })
            }
            Self::Vision(_) => serde_json::json!({
                "error": "identification_failed",
                "message": "Couldn't identify the item, please try again",
            }),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    serde_json::json!({ "error": "Invalid credentials" })
                }
                AuthError::UserAlreadyExists => {
                    serde_json::json!({ "error": "An account with this email already exists" })
                }
                AuthError::WeakPassword(msg) => serde_json::json!({ "error": msg }),
                AuthError::InvalidEmail(_) => {
                    serde_json::json!({ "error": "Invalid email address" })
                }
                _ => serde_json::json!({ "error": "Authentication error" }),
            },
            Self::Billing(err) => match err {
                BillingError::SignatureInvalid => {
                    serde_json::json!({ "error": "Invalid webhook signature" })
                }
                BillingError::Payload(_) => {
                    serde_json::json!({ "error": "Malformed webhook payload" })
                }
                _ => serde_json::json!({ "error": "Webhook processing failed" }),
            },
            Self::SubscriptionRequired => serde_json::json!({
                "error": "subscription_required",
                "redirect": "/subscribe",
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product ABC123".to_string());
        assert_eq!(err.to_string(), "Not found: product ABC123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::SubscriptionRequired),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_vision_errors_map_to_bad_gateway() {
        let err = AppError::Vision(VisionError::Api {
            status: 500,
            message: "index offline".to_string(),
        });
        assert_eq!(get_status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_bad_signature_maps_to_bad_request() {
        assert_eq!(
            get_status(AppError::Billing(BillingError::SignatureInvalid)),
            StatusCode::BAD_REQUEST
        );
    }
}
