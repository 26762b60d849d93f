//! Integration tests for catalog upsert semantics against a live database.
//!
//! These tests require a `PostgreSQL` database with migrations applied;
//! they exercise the repository directly rather than going through the
//! external source.
//!
//! Run with: cargo test -p quicklist-integration-tests -- --ignored

use std::collections::BTreeMap;

use secrecy::SecretString;

use quicklist_catalog::{ProductRepository, SourceRecord, UpsertOutcome, create_pool};
use quicklist_core::ProductCode;

fn database_url() -> SecretString {
    let url = std::env::var("QUICKLIST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("QUICKLIST_DATABASE_URL must be set");
    SecretString::from(url)
}

fn record(code: &str, name: &str, price: &str) -> SourceRecord {
    SourceRecord {
        code: Some(ProductCode::parse(code).expect("valid code")),
        name: name.to_owned(),
        brand: Some("Integration".to_owned()),
        description: None,
        image_url: None,
        price: Some(price.parse().expect("valid decimal")),
        attributes: BTreeMap::from([("condition".to_owned(), "used".to_owned())]),
    }
}

/// A code unique to this test run.
fn unique_code(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
#[ignore = "Requires database with migrations applied"]
async fn test_upsert_is_idempotent_per_code() {
    let pool = create_pool(&database_url()).await.expect("pool");
    let repo = ProductRepository::new(&pool);
    let code = unique_code("ITEST");

    // First run inserts
    let (first, outcome) = repo
        .upsert(&record(&code, "Integration Widget", "10.00"))
        .await
        .expect("first upsert");
    assert_eq!(outcome, UpsertOutcome::Inserted);

    // Second run with updated price overwrites the same row
    let (second, outcome) = repo
        .upsert(&record(&code, "Integration Widget", "12.50"))
        .await
        .expect("second upsert");
    assert_eq!(outcome, UpsertOutcome::Updated);

    // Identifying code never changes; name unchanged when re-supplied identical
    assert_eq!(first.code, second.code);
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Integration Widget");
    assert_eq!(second.comps.retail.to_string(), "12.50");

    // Exactly one row for the code
    let found = repo
        .find_by_codes(&[first.code.clone()])
        .await
        .expect("find_by_codes");
    assert_eq!(found.len(), 1);
}

#[tokio::test]
#[ignore = "Requires database with migrations applied"]
async fn test_batch_fetch_drops_unknown_codes() {
    let pool = create_pool(&database_url()).await.expect("pool");
    let repo = ProductRepository::new(&pool);
    let code = unique_code("DRIFT");

    repo.upsert(&record(&code, "Drifting Widget", "5.00"))
        .await
        .expect("upsert");

    let known = ProductCode::parse(&code).expect("valid code");
    let unknown = ProductCode::parse("NEVER-INDEXED-0000").expect("valid code");

    let found = repo
        .find_by_codes(&[known.clone(), unknown])
        .await
        .expect("find_by_codes");

    assert_eq!(found.len(), 1);
    assert_eq!(found.first().expect("one row").code, known);
}
