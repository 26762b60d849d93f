//! Payment-provider webhook handling.
//!
//! Verifies event signatures, dedupes deliveries, and applies subscription
//! state transitions. The order is strict: nothing is parsed for effect and
//! no state is mutated until the signature checks out, and no transition is
//! applied twice for the same provider event id.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use sqlx::PgPool;
use thiserror::Error;

use quicklist_core::UserId;

use crate::config::StripeConfig;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::db::webhook_events::{EventOutcome, WebhookEventRepository};
use crate::models::user::User;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age of a signed payload, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Fallback billing period when a checkout event carries no period end.
/// The provider's next renewal event supersedes it.
const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Event type for a completed hosted checkout.
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Event type for a deleted/canceled subscription.
pub const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Errors that can occur during webhook processing.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Signature header missing, malformed, stale, or wrong.
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Payload failed to parse after verification.
    #[error("malformed webhook payload: {0}")]
    Payload(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What handling a verified event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A state transition was applied.
    Processed,
    /// The event id was already seen; nothing re-applied.
    Duplicate,
    /// Verified but deliberately not applied (unhandled type, unknown account).
    Ignored,
}

// =============================================================================
// Signature verification
// =============================================================================

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v0=...]`.
struct SignatureHeader {
    timestamp: i64,
    v1: String,
}

fn parse_signature_header(header: &str) -> Option<SignatureHeader> {
    let mut timestamp: Option<i64> = None;
    let mut v1: Option<String> = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => v1 = Some(value.to_owned()),
            _ => {}
        }
    }

    Some(SignatureHeader {
        timestamp: timestamp?,
        v1: v1?,
    })
}

/// Verify an HMAC-SHA256 webhook signature.
///
/// The signed payload is `"{timestamp}.{body}"` keyed with the shared
/// secret (sans its `whsec_` prefix). Timestamps older or newer than the
/// tolerance window are rejected to blunt replay; the digest comparison is
/// constant-time via [`Mac::verify_slice`].
///
/// # Errors
///
/// Returns `BillingError::SignatureInvalid` on any failure; callers must
/// not distinguish causes to the sender.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), BillingError> {
    let parsed = parse_signature_header(header).ok_or(BillingError::SignatureInvalid)?;

    if (now.timestamp() - parsed.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp = parsed.timestamp,
            "webhook timestamp outside tolerance window"
        );
        return Err(BillingError::SignatureInvalid);
    }

    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let signed_payload = format!("{}.{payload}", parsed.timestamp);

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| BillingError::SignatureInvalid)?;
    mac.update(signed_payload.as_bytes());

    let claimed = hex::decode(&parsed.v1).map_err(|_| BillingError::SignatureInvalid)?;
    mac.verify_slice(&claimed)
        .map_err(|_| BillingError::SignatureInvalid)
}

// =============================================================================
// Event wire types
// =============================================================================

/// Provider event envelope, reduced to the fields we act on.
#[derive(Debug, serde::Deserialize)]
pub struct WebhookEvent {
    /// Provider's event identifier; the dedupe key.
    pub id: String,
    /// Event type string (e.g. `checkout.session.completed`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: EventData,
}

/// `data` member of the envelope.
#[derive(Debug, serde::Deserialize)]
pub struct EventData {
    /// The object the event describes (checkout session or subscription).
    pub object: EventObject,
}

/// The subset of checkout-session / subscription fields we consume.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EventObject {
    /// Our account id, set when the front end opens the checkout session.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Provider's customer reference.
    #[serde(default)]
    pub customer: Option<String>,
    /// End of the billing period, unix seconds.
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

impl EventObject {
    /// Billing period end carried by the event, or the default period from
    /// `now` when the event has none.
    fn period_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.current_period_end
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| now + chrono::Duration::days(DEFAULT_PERIOD_DAYS))
    }
}

// =============================================================================
// Service
// =============================================================================

/// Webhook handler for payment-provider events.
pub struct BillingService<'a> {
    users: UserRepository<'a>,
    events: WebhookEventRepository<'a>,
    config: &'a StripeConfig,
}

impl<'a> BillingService<'a> {
    /// Create a new billing service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a StripeConfig) -> Self {
        Self {
            users: UserRepository::new(pool),
            events: WebhookEventRepository::new(pool),
            config,
        }
    }

    /// Verify and parse a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::SignatureInvalid` before looking at the body
    /// at all if verification fails; `BillingError::Payload` if the
    /// verified body does not parse.
    pub fn verify_event(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> Result<WebhookEvent, BillingError> {
        verify_signature(
            payload,
            signature_header,
            self.config.webhook_secret.expose_secret(),
            Utc::now(),
        )?;

        serde_json::from_str(payload).map_err(|e| BillingError::Payload(e.to_string()))
    }

    /// Handle a verified event.
    ///
    /// Duplicate deliveries of the same event id are acknowledged without
    /// re-applying the transition, so a replayed checkout event can never
    /// extend the billing period twice.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Repository` if a database operation fails.
    /// The claim stands even then; the ledger records `error` so operators
    /// can reconcile instead of the provider's retry double-applying.
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        if !self.events.claim(&event.id, &event.event_type).await? {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "duplicate webhook delivery, skipping"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        let result = self.apply_event(event).await;

        let ledger_outcome = match &result {
            Ok(WebhookOutcome::Processed) => EventOutcome::Processed,
            Ok(_) => EventOutcome::Skipped,
            Err(_) => EventOutcome::Error,
        };
        if let Err(e) = self.events.record_outcome(&event.id, ledger_outcome).await {
            tracing::error!(event_id = %event.id, error = %e, "failed to record webhook outcome");
        }

        result
    }

    /// Dispatch a claimed event to its transition.
    async fn apply_event(&self, event: &WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        match event.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => self.handle_checkout_completed(event).await,
            EVENT_SUBSCRIPTION_DELETED => self.handle_subscription_deleted(event).await,
            other => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = other,
                    "unhandled webhook event type, acknowledging"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// `checkout.session.completed`: any state -> `active`.
    async fn handle_checkout_completed(
        &self,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, BillingError> {
        let object = &event.data.object;

        let Some(user) = self.resolve_user(object).await? else {
            tracing::warn!(
                event_id = %event.id,
                "checkout event resolves to no account, acknowledging"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let period_end = object.period_end(Utc::now());
        let updated = self
            .users
            .activate_subscription(user.id, period_end, object.customer.as_deref())
            .await?;

        tracing::info!(
            event_id = %event.id,
            user_id = %updated.id,
            %period_end,
            "subscription activated"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// `customer.subscription.deleted`: `active` -> `canceled`.
    async fn handle_subscription_deleted(
        &self,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, BillingError> {
        let Some(customer) = event.data.object.customer.as_deref() else {
            tracing::warn!(event_id = %event.id, "subscription event without customer reference");
            return Ok(WebhookOutcome::Ignored);
        };

        match self.users.cancel_by_customer(customer).await? {
            Some(user) => {
                tracing::info!(
                    event_id = %event.id,
                    user_id = %user.id,
                    "subscription canceled"
                );
                Ok(WebhookOutcome::Processed)
            }
            None => {
                tracing::warn!(
                    event_id = %event.id,
                    customer,
                    "no active account for canceled subscription, acknowledging"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Resolve the account a checkout event belongs to.
    ///
    /// `client_reference_id` (our account id, set when the front end opens
    /// checkout) is the primary key; the provider's customer reference is
    /// the fallback for accounts that already completed a checkout before.
    async fn resolve_user(&self, object: &EventObject) -> Result<Option<User>, BillingError> {
        if let Some(reference) = object.client_reference_id.as_deref() {
            match reference.parse::<i32>() {
                Ok(id) => {
                    if let Some(user) = self.users.get_by_id(UserId::new(id)).await? {
                        return Ok(Some(user));
                    }
                    tracing::warn!(reference, "client_reference_id matches no account");
                }
                Err(_) => {
                    tracing::warn!(reference, "client_reference_id is not an account id");
                }
            }
        }

        if let Some(customer) = object.customer.as_deref() {
            return Ok(self.users.find_by_stripe_customer(customer).await?);
        }

        Ok(None)
    }
}
