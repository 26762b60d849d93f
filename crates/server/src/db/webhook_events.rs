//! Payment-provider webhook event ledger.
//!
//! Providers deliver events at least once; the ledger turns "at least
//! once" into "exactly once" for state mutations. The claim is a single
//! `INSERT .. ON CONFLICT DO NOTHING RETURNING`, so concurrent duplicate
//! deliveries cannot both win it.

use sqlx::PgPool;

use super::RepositoryError;

/// Outcome recorded for a processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// State transition applied.
    Processed,
    /// Verified but intentionally not applied (unhandled type, unknown account).
    Skipped,
    /// Handler failed after the claim.
    Error,
}

impl EventOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

/// Repository for the webhook event dedupe ledger.
pub struct WebhookEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WebhookEventRepository<'a> {
    /// Create a new webhook event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim an event id for processing.
    ///
    /// Returns `true` if this delivery won the claim and should be
    /// processed; `false` if the id was already seen (duplicate delivery,
    /// acknowledge without reprocessing).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn claim(&self, event_id: &str, event_type: &str) -> Result<bool, RepositoryError> {
        let claimed: Option<(i32,)> = sqlx::query_as(
            "INSERT INTO webhook_event (event_id, event_type, outcome)
             VALUES ($1, $2, 'processing')
             ON CONFLICT (event_id) DO NOTHING
             RETURNING id",
        )
        .bind(event_id)
        .bind(event_type)
        .fetch_optional(self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    /// Record the outcome of a claimed event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event was never claimed.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn record_outcome(
        &self,
        event_id: &str,
        outcome: EventOutcome,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE webhook_event SET outcome = $2 WHERE event_id = $1")
            .bind(event_id)
            .bind(outcome.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_strings() {
        assert_eq!(EventOutcome::Processed.as_str(), "processed");
        assert_eq!(EventOutcome::Skipped.as_str(), "skipped");
        assert_eq!(EventOutcome::Error.as_str(), "error");
    }
}
