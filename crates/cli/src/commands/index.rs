//! Matching-index management commands.
//!
//! The embedding index is the out-of-process half of identification: its
//! item codes must stay aligned with catalog rows. `sync` publishes
//! incrementally; this command triggers the heavyweight full rebuild.
//!
//! # Usage
//!
//! ```bash
//! ql-cli index rebuild
//! ```
//!
//! # Environment Variables
//!
//! - `VISION_ENDPOINT_URL` - Base URL of the matching service
//! - `VISION_API_KEY` - API key for the matching service
//! - `VISION_DEPLOYED_INDEX` - Deployed index identifier

use tracing::info;

use quicklist_catalog::{IndexConfig, MatchIndexClient};

/// Trigger a full index rebuild.
///
/// The rebuild runs inside the matching service and can take tens of
/// minutes; this command returns as soon as it is enqueued.
///
/// # Errors
///
/// Returns an error if configuration is missing or the service rejects
/// the rebuild request.
pub async fn rebuild() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = IndexConfig::from_env()?;
    let client = MatchIndexClient::new(&config)?;

    info!("Requesting full matching-index rebuild...");
    client.rebuild().await?;

    info!("Rebuild enqueued. The index catches up asynchronously.");
    Ok(())
}
