//! Matching-index publisher.
//!
//! The external embedding service keeps its own index of catalog records,
//! keyed by identifying code. Whenever the catalog store changes, that
//! index must be realigned or identification results will point at codes
//! the store no longer explains. This client covers both alignment paths:
//! an incremental record publish after a sync run, and the full rebuild an
//! operator triggers when drift has accumulated.
//!
//! Embedding computation itself happens inside the matching service; we
//! only ship it the catalog fields it embeds.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;

use crate::config::IndexConfig;
use crate::model::Product;

/// Errors that can occur when talking to the matching-index admin surface.
#[derive(Debug, Error)]
pub enum IndexError {
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an error response.
    #[error("index API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client construction failed.
    #[error("invalid index client configuration: {0}")]
    Config(String),
}

/// Client for the matching service's index-admin endpoints.
#[derive(Clone)]
pub struct MatchIndexClient {
    client: reqwest::Client,
    base_url: String,
    deployed_index: String,
}

/// One index record: the catalog fields the matching service embeds.
#[derive(Debug, Serialize)]
struct IndexRecord<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

impl MatchIndexClient {
    /// Create a new index client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| IndexError::Config(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            deployed_index: config.deployed_index.clone(),
        })
    }

    /// Incrementally upsert records for the given products.
    ///
    /// Returns the number of records accepted.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn publish(&self, products: &[Product]) -> Result<usize, IndexError> {
        if products.is_empty() {
            return Ok(0);
        }

        let records: Vec<IndexRecord<'_>> = products
            .iter()
            .map(|p| IndexRecord {
                id: p.code.as_str(),
                name: &p.name,
                image_url: p.image_url.as_deref(),
            })
            .collect();

        let count = records.len();
        let url = format!(
            "{}/indexes/{}/records",
            self.base_url, self.deployed_index
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "records": records }))
            .send()
            .await?;
        let status = response.status();

        // 202 Accepted is the expected response for batch upserts
        if !status.is_success() && status.as_u16() != 202 {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(count)
    }

    /// Trigger a full index rebuild from the catalog store.
    ///
    /// The rebuild runs inside the matching service and can take tens of
    /// minutes; this call only enqueues it.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn rebuild(&self) -> Result<(), IndexError> {
        let url = format!(
            "{}/indexes/{}/rebuild",
            self.base_url, self.deployed_index
        );

        let response = self.client.post(&url).send().await?;
        let status = response.status();

        if !status.is_success() && status.as_u16() != 202 {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
