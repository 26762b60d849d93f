//! Catalog sync command.
//!
//! Runs the offline batch job that keeps the catalog store consistent
//! with the external product-data source, then incrementally publishes the
//! touched rows to the matching index.
//!
//! # Usage
//!
//! ```bash
//! # Terms from a YAML list
//! ql-cli sync --terms-file terms.yaml
//!
//! # Ad-hoc terms
//! ql-cli sync --term "vintage denim jacket"
//!
//! # Refresh every existing product by its code
//! ql-cli sync --refresh
//! ```
//!
//! # Environment Variables
//!
//! See [`quicklist_catalog::CatalogConfig`] for the full list
//! (`QUICKLIST_DATABASE_URL`, `MARKET_API_*`, `VISION_*`).

use std::path::Path;

use tracing::info;

use quicklist_catalog::{
    CatalogConfig, MarketFeedClient, MatchIndexClient, ProductRepository, SyncConfig, SyncRunner,
    create_pool,
};
use quicklist_core::ProductCode;

/// Run the catalog sync job.
///
/// Exactly one term source applies, in precedence order: `--refresh`, the
/// terms file, ad-hoc `--term` flags.
///
/// # Errors
///
/// Returns an error if configuration is missing, the terms file cannot be
/// read, or no terms are available. Per-term failures do NOT error: the
/// job isolates them and reports a summary.
pub async fn run(
    terms_file: Option<&str>,
    ad_hoc_terms: &[String],
    refresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CatalogConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let source = MarketFeedClient::new(&config.market)?;
    let index = MatchIndexClient::new(&config.index)?;

    let terms = if refresh {
        let codes = ProductRepository::new(&pool).all_codes().await?;
        info!(count = codes.len(), "refreshing existing catalog by code");
        codes.into_iter().map(ProductCode::into_inner).collect()
    } else if let Some(path) = terms_file {
        load_terms_file(path).await?
    } else {
        ad_hoc_terms.to_vec()
    };

    if terms.is_empty() {
        return Err("no search terms: pass --terms-file, --term, or --refresh".into());
    }

    let runner = SyncRunner::new(&source, &pool, SyncConfig::default()).with_index(&index);
    let report = runner.run(&terms).await;

    info!(%report, "sync run complete");
    Ok(())
}

/// Load search terms from a YAML list file.
async fn load_terms_file(path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("File not found: {path}").into());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let terms: Vec<String> = serde_yaml::from_str(&content)?;

    info!(path, count = terms.len(), "loaded search terms");
    Ok(terms)
}
