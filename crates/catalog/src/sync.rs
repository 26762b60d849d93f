//! Catalog sync job.
//!
//! Keeps the catalog store consistent with the external product-data
//! source. The job is a sequential batch: one term at a time, one
//! committed upsert at a time. A failing term is retried with bounded
//! backoff when the failure is transient, then skipped; it never aborts
//! the rest of the run.
//!
//! After the batch, the matching index is incrementally updated with the
//! rows this run touched so its item codes stay aligned with the store.
//! A full index rebuild remains an explicit operator step
//! (`ql-cli index rebuild`).

use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::index::MatchIndexClient;
use crate::model::{Product, SourceRecord};
use crate::source::{ProductSource, SourceError};
use crate::store::{ProductRepository, UpsertOutcome};

/// Tuning knobs for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Total lookup attempts per term, including the first.
    pub max_attempts: usize,
    /// Base delay for exponential backoff between attempts, in milliseconds.
    pub backoff_base_ms: u64,
    /// Cap on any single backoff delay.
    pub max_backoff: Duration,
    /// Minimum courtesy pause between terms, in milliseconds.
    pub courtesy_min_ms: u64,
    /// Maximum courtesy pause between terms, in milliseconds.
    pub courtesy_max_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base_ms: 250,
            max_backoff: Duration::from_secs(10),
            courtesy_min_ms: 500,
            courtesy_max_ms: 1500,
        }
    }
}

/// Summary of one sync run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// New rows inserted.
    pub added: usize,
    /// Existing rows overwritten.
    pub updated: usize,
    /// Terms the source had no result for.
    pub skipped: usize,
    /// Terms that failed after retries (or on a permanent error).
    pub failed: usize,
    /// Records pushed to the matching index after the batch.
    pub indexed: usize,
}

impl SyncReport {
    /// Number of terms that produced a committed row.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.added + self.updated
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "added={} updated={} skipped={} failed={} indexed={}",
            self.added, self.updated, self.skipped, self.failed, self.indexed
        )
    }
}

/// Look up one term with bounded exponential backoff on transient errors.
///
/// Permanent outcomes (`Ok(None)`, non-transient errors) return on the
/// first attempt.
pub async fn fetch_with_retry<S: ProductSource>(
    source: &S,
    term: &str,
    config: &SyncConfig,
) -> Result<Option<SourceRecord>, SourceError> {
    let strategy = ExponentialBackoff::from_millis(config.backoff_base_ms)
        .max_delay(config.max_backoff)
        .map(jitter)
        .take(config.max_attempts.saturating_sub(1));

    RetryIf::spawn(strategy, || source.lookup(term), SourceError::is_transient).await
}

/// The catalog sync job.
///
/// Generic over the source so the engine can run against a fake in tests.
pub struct SyncRunner<'a, S> {
    source: &'a S,
    products: ProductRepository<'a>,
    index: Option<&'a MatchIndexClient>,
    config: SyncConfig,
}

impl<'a, S: ProductSource> SyncRunner<'a, S> {
    /// Create a new sync runner.
    #[must_use]
    pub const fn new(source: &'a S, pool: &'a PgPool, config: SyncConfig) -> Self {
        Self {
            source,
            products: ProductRepository::new(pool),
            index: None,
            config,
        }
    }

    /// Also publish touched rows to the matching index after the batch.
    #[must_use]
    pub const fn with_index(mut self, index: &'a MatchIndexClient) -> Self {
        self.index = Some(index);
        self
    }

    /// Run the job over a list of search terms.
    ///
    /// Never fails as a whole: per-term outcomes are tallied in the
    /// returned [`SyncReport`], and successfully processed rows stay
    /// committed regardless of later failures.
    pub async fn run(&self, terms: &[String]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut touched: Vec<Product> = Vec::new();

        tracing::info!(terms = terms.len(), "catalog sync starting");

        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                self.courtesy_pause().await;
            }

            match fetch_with_retry(self.source, term, &self.config).await {
                Ok(Some(record)) => match self.products.upsert(&record).await {
                    Ok((product, UpsertOutcome::Inserted)) => {
                        tracing::info!(%term, code = %product.code, "inserted product");
                        report.added += 1;
                        touched.push(product);
                    }
                    Ok((product, UpsertOutcome::Updated)) => {
                        tracing::info!(%term, code = %product.code, "updated product");
                        report.updated += 1;
                        touched.push(product);
                    }
                    Err(e) => {
                        tracing::error!(%term, error = %e, "upsert failed");
                        report.failed += 1;
                    }
                },
                Ok(None) => {
                    tracing::info!(%term, "no result from source, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        %term,
                        error = %e,
                        transient = e.is_transient(),
                        "term failed after retries, continuing"
                    );
                    report.failed += 1;
                }
            }
        }

        report.indexed = self.align_index(&touched).await;

        tracing::info!(%report, "catalog sync finished");
        report
    }

    /// Push this run's rows to the matching index, if a client is attached.
    ///
    /// Index drift is tolerated by the read path, so a publish failure
    /// degrades to a logged warning instead of failing the run.
    async fn align_index(&self, touched: &[Product]) -> usize {
        if touched.is_empty() {
            return 0;
        }

        let Some(index) = self.index else {
            tracing::warn!(
                touched = touched.len(),
                "matching index not updated this run; run `ql-cli index rebuild` to realign"
            );
            return 0;
        };

        match index.publish(touched).await {
            Ok(count) => {
                tracing::info!(count, "matching index updated");
                count
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "matching index publish failed; run `ql-cli index rebuild` to realign"
                );
                0
            }
        }
    }

    /// Randomized courtesy pause between source calls.
    async fn courtesy_pause(&self) {
        if self.config.courtesy_max_ms == 0 {
            return;
        }
        let ms = rand::rng().random_range(self.config.courtesy_min_ms..=self.config.courtesy_max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    fn fast_config() -> SyncConfig {
        SyncConfig {
            max_attempts: 3,
            backoff_base_ms: 1,
            max_backoff: Duration::from_millis(5),
            courtesy_min_ms: 0,
            courtesy_max_ms: 0,
        }
    }

    fn record(name: &str) -> SourceRecord {
        SourceRecord {
            code: None,
            name: name.to_owned(),
            brand: None,
            description: None,
            image_url: None,
            price: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Source that fails the first `fail_first` calls, then answers.
    struct FlakySource {
        fail_first: usize,
        error: fn() -> SourceError,
        answer: Option<SourceRecord>,
        calls: Mutex<usize>,
    }

    impl FlakySource {
        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ProductSource for FlakySource {
        async fn lookup(&self, _term: &str) -> Result<Option<SourceRecord>, SourceError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call <= self.fail_first {
                Err((self.error)())
            } else {
                Ok(self.answer.clone())
            }
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let source = FlakySource {
            fail_first: 2,
            error: || SourceError::Server { status: 503 },
            answer: Some(record("Retried Item")),
            calls: Mutex::new(0),
        };

        let result = fetch_with_retry(&source, "retried item", &fast_config()).await;
        assert_eq!(result.unwrap().unwrap().name, "Retried Item");
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let source = FlakySource {
            fail_first: usize::MAX,
            error: || SourceError::Rejected {
                status: 400,
                message: "bad term".to_owned(),
            },
            answer: None,
            calls: Mutex::new(0),
        };

        let result = fetch_with_retry(&source, "bad term", &fast_config()).await;
        assert!(matches!(result, Err(SourceError::Rejected { .. })));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let source = FlakySource {
            fail_first: usize::MAX,
            error: || SourceError::RateLimited,
            answer: None,
            calls: Mutex::new(0),
        };

        let config = fast_config();
        let result = fetch_with_retry(&source, "always throttled", &config).await;
        assert!(matches!(result, Err(SourceError::RateLimited)));
        assert_eq!(source.calls(), config.max_attempts);
    }

    #[tokio::test]
    async fn test_no_result_returns_immediately() {
        let source = FlakySource {
            fail_first: 0,
            error: || SourceError::RateLimited,
            answer: None,
            calls: Mutex::new(0),
        };

        let result = fetch_with_retry(&source, "unknown thing", &fast_config()).await;
        assert!(result.unwrap().is_none());
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_report_display_and_counts() {
        let report = SyncReport {
            added: 2,
            updated: 3,
            skipped: 1,
            failed: 1,
            indexed: 5,
        };
        assert_eq!(report.processed(), 5);
        assert_eq!(
            report.to_string(),
            "added=2 updated=3 skipped=1 failed=1 indexed=5"
        );
    }
}
