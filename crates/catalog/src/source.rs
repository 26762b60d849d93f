//! External product-data source.
//!
//! The sync job talks to an authoritative product-data source through the
//! [`ProductSource`] trait: one search term in, at most one normalized
//! record out. The trait seam exists so the sync engine can be exercised
//! against an in-memory fake; production uses [`MarketFeedClient`].

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use quicklist_core::ProductCode;

use crate::config::MarketFeedConfig;
use crate::model::SourceRecord;

/// Errors that can occur when querying the product-data source.
///
/// The transient/permanent split drives the sync job's retry policy:
/// transient failures get bounded backoff, permanent ones are skipped on
/// the first attempt.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The source throttled us.
    #[error("rate limited by source")]
    RateLimited,

    /// The source returned a server-side error.
    #[error("source server error: status {status}")]
    Server { status: u16 },

    /// The source rejected the request outright.
    #[error("source rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not parse.
    #[error("unparseable source response: {0}")]
    Parse(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, throttling, and 5xx responses are worth a
    /// bounded retry; rejections and parse failures are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited | Self::Server { .. })
    }
}

/// A source of normalized product records.
///
/// `Ok(None)` is the permanent "no result for this term" outcome and is
/// never retried; errors are classified via [`SourceError::is_transient`].
pub trait ProductSource {
    /// Look up a single search term.
    fn lookup(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<Option<SourceRecord>, SourceError>> + Send;
}

// =============================================================================
// HTTP client
// =============================================================================

/// HTTP client for the market product-data feed.
#[derive(Clone)]
pub struct MarketFeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketFeedClient {
    /// Create a new market feed client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MarketFeedConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| SourceError::Parse(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn search(&self, term: &str) -> Result<Option<SourceRecord>, SourceError> {
        let url = format!("{}/products/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("term", term), ("limit", "1")])
            .send()
            .await?;
        let status = response.status();

        match status.as_u16() {
            404 => return Ok(None),
            429 => return Err(SourceError::RateLimited),
            s if status.is_server_error() => return Err(SourceError::Server { status: s }),
            s if !status.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(SourceError::Rejected { status: s, message });
            }
            _ => {}
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let Some(item) = body.results.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(item.into_record()?))
    }
}

impl ProductSource for MarketFeedClient {
    async fn lookup(&self, term: &str) -> Result<Option<SourceRecord>, SourceError> {
        self.search(term).await
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Search response envelope from the feed.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<FeedProduct>,
}

/// One product listing as the feed reports it.
#[derive(Debug, Deserialize)]
struct FeedProduct {
    /// Stable identifier, when the feed has one for this listing.
    #[serde(default)]
    code: Option<String>,
    title: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    /// Price as a decimal string (the feed avoids JSON floats).
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl FeedProduct {
    fn into_record(self) -> Result<SourceRecord, SourceError> {
        let code = self
            .code
            .as_deref()
            .map(ProductCode::parse)
            .transpose()
            .map_err(|e| SourceError::Parse(format!("invalid code from feed: {e}")))?;

        Ok(SourceRecord {
            code,
            name: self.title,
            brand: self.brand,
            description: self.description,
            image_url: self.image_url,
            price: self.price,
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::RateLimited.is_transient());
        assert!(SourceError::Server { status: 503 }.is_transient());
        assert!(
            !SourceError::Rejected {
                status: 400,
                message: "bad term".to_owned()
            }
            .is_transient()
        );
        assert!(!SourceError::Parse("truncated body".to_owned()).is_transient());
    }

    #[test]
    fn test_feed_product_parses_into_record() {
        let json = r#"{
            "code": "B07XJ8C8F5",
            "title": "Noise Cancelling Headphones",
            "brand": "Sonic",
            "price": "89.99",
            "attributes": {"color": "black", "condition": "used"}
        }"#;
        let feed: FeedProduct = serde_json::from_str(json).unwrap();
        let record = feed.into_record().unwrap();

        assert_eq!(record.code.as_ref().unwrap().as_str(), "B07XJ8C8F5");
        assert_eq!(record.name, "Noise Cancelling Headphones");
        assert_eq!(record.price, Some(Decimal::from_str_exact("89.99").unwrap()));
        assert_eq!(record.attributes.get("color").map(String::as_str), Some("black"));
    }

    #[test]
    fn test_feed_product_without_code() {
        let json = r#"{"title": "Mystery Lamp"}"#;
        let feed: FeedProduct = serde_json::from_str(json).unwrap();
        let record = feed.into_record().unwrap();
        assert!(record.code.is_none());
        assert!(record.price.is_none());
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn test_feed_product_bad_code_is_parse_error() {
        let json = r#"{"code": "HAS SPACE", "title": "Bad"}"#;
        let feed: FeedProduct = serde_json::from_str(json).unwrap();
        assert!(matches!(feed.into_record(), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_empty_search_response_deserializes() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.results.is_empty());
    }
}
