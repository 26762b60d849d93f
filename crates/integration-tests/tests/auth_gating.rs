//! Integration tests for registration, login, and subscription gating.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p quicklist-server)
//!
//! Run with: cargo test -p quicklist-integration-tests -- --ignored

use serde_json::{Value, json};

use quicklist_integration_tests::{base_url, client, unique_email};

/// A tiny valid JPEG header; enough to pass upload validation.
const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_register_starts_trial() {
    let client = client();
    let email = unique_email("trial");

    let resp = client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({ "email": email, "password": "a long enough password" }))
        .send()
        .await
        .expect("register failed");

    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("register body");
    assert_eq!(body["subscription_status"], "trial");
    assert!(body["trial_end"].is_string());

    // Fresh trial account has access
    let resp = client
        .get(format!("{}/account/subscription", base_url()))
        .send()
        .await
        .expect("subscription check failed");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("subscription body");
    assert_eq!(body["effective_status"], "trial");
    assert_eq!(body["allows_access"], true);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_identify_requires_authentication() {
    // No session cookie at all
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(JPEG_STUB.to_vec()).file_name("item.jpg"),
    );

    let resp = reqwest::Client::new()
        .post(format!("{}/api/identify", base_url()))
        .multipart(form)
        .send()
        .await
        .expect("identify request failed");

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_identify_rejects_non_image_upload() {
    let client = client();
    let email = unique_email("upload");

    let resp = client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({ "email": email, "password": "a long enough password" }))
        .send()
        .await
        .expect("register failed");
    assert_eq!(resp.status(), 201);

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"<html>not an image</html>".to_vec())
            .file_name("sneaky.jpg"),
    );

    let resp = client
        .post(format!("{}/api/identify", base_url()))
        .multipart(form)
        .send()
        .await
        .expect("identify request failed");

    // Rejected before any external call
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_duplicate_registration_conflicts() {
    let client = client();
    let email = unique_email("dupe");
    let body = json!({ "email": email, "password": "a long enough password" });

    let first = client
        .post(format!("{}/auth/register", base_url()))
        .json(&body)
        .send()
        .await
        .expect("first register failed");
    assert_eq!(first.status(), 201);

    let second = client
        .post(format!("{}/auth/register", base_url()))
        .json(&body)
        .send()
        .await
        .expect("second register failed");
    assert_eq!(second.status(), 409);
}
