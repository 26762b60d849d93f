//! Payment-provider webhook endpoint.
//!
//! Signature verification happens before anything else; an unverifiable
//! delivery is rejected with a 4xx so the provider retries, and never
//! touches state. Verified duplicates are acknowledged with a 2xx so the
//! provider stops redelivering.

use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::services::billing::{BillingError, BillingService, WebhookOutcome};
use crate::state::AppState;

/// Handle a signed payment-provider event.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Billing(BillingError::SignatureInvalid))?;

    let service = BillingService::new(state.pool(), &state.config().stripe);

    let event = service.verify_event(&body, signature)?;
    let outcome = service.handle_event(&event).await?;

    let outcome_str = match outcome {
        WebhookOutcome::Processed => "processed",
        WebhookOutcome::Duplicate => "duplicate",
        WebhookOutcome::Ignored => "ignored",
    };

    Ok(Json(serde_json::json!({
        "received": true,
        "outcome": outcome_str,
    })))
}
