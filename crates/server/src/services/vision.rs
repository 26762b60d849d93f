//! Embedding-search client for item identification.
//!
//! Contract with the matching service: image in, ranked list of
//! identifying codes out. Embedding computation and (in multi mode)
//! object detection happen inside the service; we ship it the raw image
//! bytes base64-encoded and get back nearest-neighbor candidates.
//!
//! Identification failures are surfaced as typed errors and never retried
//! here; the user re-submits.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use quicklist_core::ProductCode;

use crate::config::VisionConfig;

/// Errors that can occur when calling the embedding-search service.
#[derive(Debug, Error)]
pub enum VisionError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an error response.
    #[error("vision API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not parse.
    #[error("unparseable vision response: {0}")]
    Parse(String),

    /// Client construction failed.
    #[error("invalid vision client configuration: {0}")]
    Config(String),
}

/// Identification mode forwarded to the matching service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifyMode {
    /// Match the whole image as one item.
    #[default]
    Single,
    /// Detect objects first and match each one.
    Multi,
}

impl IdentifyMode {
    /// Parse from the request's `mode` form field; anything but "multi"
    /// falls back to single, matching the original behavior.
    #[must_use]
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value {
            Some("multi") => Self::Multi,
            _ => Self::Single,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

/// One ranked identification candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Identifying code of the matched catalog item.
    pub code: ProductCode,
    /// Distance reported by the index (smaller is closer).
    pub distance: f64,
}

/// Client for the embedding-search service.
#[derive(Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    deployed_index: String,
    num_neighbors: u32,
}

impl VisionClient {
    /// Create a new vision client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| VisionError::Config(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint_url.trim_end_matches('/').to_owned(),
            deployed_index: config.deployed_index.clone(),
            num_neighbors: config.num_neighbors,
        })
    }

    /// Identify an image, returning ranked candidate codes.
    ///
    /// An empty vec is a valid answer: the index found no neighbors.
    ///
    /// # Errors
    ///
    /// Returns `VisionError` if the request fails, times out, or the
    /// service answers with an error.
    pub async fn identify(
        &self,
        image: &[u8],
        mode: IdentifyMode,
    ) -> Result<Vec<Candidate>, VisionError> {
        let url = format!("{}/indexes/{}/query", self.base_url, self.deployed_index);

        let body = serde_json::json!({
            "image": BASE64.encode(image),
            "mode": mode.as_str(),
            "num_neighbors": self.num_neighbors,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        Ok(candidates_from_neighbors(body.neighbors))
    }
}

/// Map raw neighbors to candidates, dropping entries whose id is not a
/// valid identifying code. The index can drift from the store; a garbage
/// id is logged, not fatal.
fn candidates_from_neighbors(neighbors: Vec<Neighbor>) -> Vec<Candidate> {
    neighbors
        .into_iter()
        .filter_map(|n| match ProductCode::parse(&n.id) {
            Ok(code) => Some(Candidate {
                code,
                distance: n.distance,
            }),
            Err(e) => {
                tracing::warn!(id = %n.id, error = %e, "dropping malformed candidate id from index");
                None
            }
        })
        .collect()
}

// =============================================================================
// Wire types
// =============================================================================

/// Query response envelope from the matching service.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    neighbors: Vec<Neighbor>,
}

/// One nearest-neighbor hit.
#[derive(Debug, Deserialize)]
struct Neighbor {
    id: String,
    #[serde(default)]
    distance: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_form_value() {
        assert_eq!(IdentifyMode::from_form_value(Some("multi")), IdentifyMode::Multi);
        assert_eq!(IdentifyMode::from_form_value(Some("single")), IdentifyMode::Single);
        assert_eq!(IdentifyMode::from_form_value(Some("garbage")), IdentifyMode::Single);
        assert_eq!(IdentifyMode::from_form_value(None), IdentifyMode::Single);
    }

    #[test]
    fn test_candidates_preserve_ranking() {
        let body: QueryResponse = serde_json::from_str(
            r#"{"neighbors": [
                {"id": "X1", "distance": 0.12},
                {"id": "X2", "distance": 0.48}
            ]}"#,
        )
        .unwrap();

        let candidates = candidates_from_neighbors(body.neighbors);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates.first().unwrap().code.as_str(), "X1");
        assert_eq!(candidates.last().unwrap().code.as_str(), "X2");
    }

    #[test]
    fn test_malformed_ids_are_dropped() {
        let body: QueryResponse = serde_json::from_str(
            r#"{"neighbors": [
                {"id": "GOOD1", "distance": 0.1},
                {"id": "   ", "distance": 0.2}
            ]}"#,
        )
        .unwrap();

        let candidates = candidates_from_neighbors(body.neighbors);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates.first().unwrap().code.as_str(), "GOOD1");
    }

    #[test]
    fn test_empty_response_is_no_candidates() {
        let body: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(candidates_from_neighbors(body.neighbors).is_empty());
    }
}
