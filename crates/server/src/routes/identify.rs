//! Item identification endpoint.
//!
//! Accepts one image upload, forwards it to the embedding-search service,
//! and resolves the returned candidate codes against the catalog store.
//! Codes the store cannot explain are dropped: the external index and the
//! catalog are allowed to drift, and drift is not an error for the caller.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Multipart, State},
};
use rust_decimal::Decimal;
use serde::Serialize;

use quicklist_catalog::{Product, ProductRepository};
use quicklist_core::ProductCode;

use crate::error::{AppError, Result};
use crate::middleware::RequireSubscriber;
use crate::services::vision::IdentifyMode;
use crate::state::AppState;

/// Maximum accepted image size.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Response Types
// =============================================================================

/// Identification response.
///
/// `no_match` is a distinct, successful shape: the service answered and
/// found nothing. External-service failures surface as a 502 instead.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentifyResponse {
    /// At least one candidate resolved to a catalog row.
    Ok { matches: Vec<ProductMatch> },
    /// The index answered with no usable candidates.
    NoMatch,
}

/// One resolved catalog match.
#[derive(Debug, Serialize)]
pub struct ProductMatch {
    pub code: ProductCode,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub comps: CompsView,
    pub attributes: BTreeMap<String, String>,
}

/// Price comparables as the API exposes them.
#[derive(Debug, Serialize)]
pub struct CompsView {
    pub retail: Decimal,
    pub high: Decimal,
    pub typical: Decimal,
}

impl From<Product> for ProductMatch {
    fn from(product: Product) -> Self {
        Self {
            code: product.code,
            name: product.name,
            brand: product.brand,
            description: product.description,
            image_url: product.image_url,
            comps: CompsView {
                retail: product.comps.retail,
                high: product.comps.high,
                typical: product.comps.typical,
            },
            attributes: product.attributes,
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Handle an identification request.
///
/// Multipart fields: `file` (the image, required), `mode` (`single` or
/// `multi`, optional). Gated by the subscription access check.
pub async fn identify(
    State(state): State<AppState>,
    RequireSubscriber(user): RequireSubscriber,
    mut multipart: Multipart,
) -> Result<Json<IdentifyResponse>> {
    let mut image: Option<Vec<u8>> = None;
    let mut mode_field: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?;
                image = Some(bytes.to_vec());
            }
            Some("mode") => {
                mode_field = field.text().await.ok();
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::BadRequest("missing 'file' field".to_owned()))?;

    // Reject junk before it ever reaches the external service.
    validate_image(&image)?;

    let mode = IdentifyMode::from_form_value(mode_field.as_deref());
    tracing::info!(user_id = %user.id, bytes = image.len(), ?mode, "identification request");

    let candidates = state.vision().identify(&image, mode).await?;
    if candidates.is_empty() {
        return Ok(Json(IdentifyResponse::NoMatch));
    }

    let codes: Vec<ProductCode> = candidates.into_iter().map(|c| c.code).collect();
    let products = ProductRepository::new(state.pool())
        .find_by_codes(&codes)
        .await?;

    let matches = rank_matches(products);
    if matches.is_empty() {
        // Every candidate pointed at a code the store no longer has.
        tracing::warn!(requested = codes.len(), "all candidates drifted from catalog");
        return Ok(Json(IdentifyResponse::NoMatch));
    }

    Ok(Json(IdentifyResponse::Ok { matches }))
}

/// Order resolved products by their high comparable, best first.
fn rank_matches(mut products: Vec<Product>) -> Vec<ProductMatch> {
    products.sort_by(|a, b| b.comps.high.cmp(&a.comps.high));
    products.into_iter().map(ProductMatch::from).collect()
}

/// Validate the upload is a supported image within the size cap.
fn validate_image(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(AppError::BadRequest("empty upload".to_owned()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(format!(
            "image exceeds {MAX_UPLOAD_BYTES} byte limit"
        )));
    }
    if sniff_image_format(bytes).is_none() {
        return Err(AppError::BadRequest(
            "unsupported file type (expected JPEG, PNG, WebP, or GIF)".to_owned(),
        ));
    }
    Ok(())
}

/// Identify the image format from magic bytes.
///
/// The client's Content-Type and filename are not trusted.
fn sniff_image_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        return Some("webp");
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use quicklist_core::{PriceComps, ProductId};

    use super::*;

    fn product(code: &str, high: &str) -> Product {
        Product {
            id: ProductId::new(1),
            code: ProductCode::parse(code).unwrap(),
            name: format!("Item {code}"),
            brand: None,
            description: None,
            image_url: None,
            comps: PriceComps::new(
                Decimal::ZERO,
                Decimal::from_str_exact(high).unwrap(),
                Decimal::ZERO,
            ),
            attributes: BTreeMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(sniff_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("jpeg"));
        assert_eq!(
            sniff_image_format(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some("png")
        );
        assert_eq!(sniff_image_format(b"GIF89a trailing"), Some("gif"));
        assert_eq!(sniff_image_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("webp"));
    }

    #[test]
    fn test_sniff_rejects_non_images() {
        assert_eq!(sniff_image_format(b"%PDF-1.4"), None);
        assert_eq!(sniff_image_format(b"<html>"), None);
        assert_eq!(sniff_image_format(&[]), None);
    }

    #[test]
    fn test_validate_image_rejects_empty_and_junk() {
        assert!(validate_image(&[]).is_err());
        assert!(validate_image(b"not an image at all").is_err());
        assert!(validate_image(&[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
    }

    #[test]
    fn test_validate_image_rejects_oversized() {
        let mut big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        big[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        assert!(validate_image(&big).is_err());
    }

    #[test]
    fn test_rank_matches_orders_by_high_comp() {
        let matches = rank_matches(vec![
            product("LOW1", "10.00"),
            product("TOP1", "99.00"),
            product("MID1", "50.00"),
        ]);

        let codes: Vec<&str> = matches.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["TOP1", "MID1", "LOW1"]);
    }
}
