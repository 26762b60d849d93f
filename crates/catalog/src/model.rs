//! Catalog domain types.
//!
//! These types represent validated domain objects separate from database row types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quicklist_core::{PriceComps, ProductCode, ProductId};

/// A catalog product (domain type).
///
/// The `code` is the stable join key to the external matching index and is
/// immutable once the row exists; everything else may be overwritten by a
/// later sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Identifying code shared with the external matching index.
    pub code: ProductCode,
    /// Display name.
    pub name: String,
    /// Brand, when known.
    pub brand: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Reference to the primary product image.
    pub image_url: Option<String>,
    /// Resale price comparables.
    pub comps: PriceComps,
    /// Open attribute bag (size, colorway, material, ...), variable per product.
    pub attributes: BTreeMap<String, String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last touched by a sync run.
    pub updated_at: DateTime<Utc>,
}

/// A normalized record parsed from the external product-data source.
///
/// One of these per successful term lookup; the sync job upserts it into
/// the catalog store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Stable identifier supplied by the source, when it has one.
    ///
    /// When absent, the sync job falls back to an exact display-name match
    /// and allocates a local code on insert.
    pub code: Option<ProductCode>,
    /// Display name.
    pub name: String,
    /// Brand, when known.
    pub brand: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Reference to the primary product image.
    pub image_url: Option<String>,
    /// Single observed price, when the source supplies one.
    pub price: Option<Decimal>,
    /// Open attribute bag.
    pub attributes: BTreeMap<String, String>,
}

impl SourceRecord {
    /// Derive price comparables from the observed price.
    ///
    /// Sources report a single price point; the comparables spread is
    /// derived from it. A record with no price keeps zeroed comps rather
    /// than blocking the upsert.
    #[must_use]
    pub fn comps(&self) -> PriceComps {
        self.price.map(PriceComps::from_single_price).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_comps_from_price() {
        let record = SourceRecord {
            code: None,
            name: "Vintage Denim Jacket".to_owned(),
            brand: Some("Levi's".to_owned()),
            description: None,
            image_url: None,
            price: Some(Decimal::from_str_exact("40.00").unwrap()),
            attributes: BTreeMap::new(),
        };
        let comps = record.comps();
        assert_eq!(comps.typical, Decimal::from_str_exact("40.00").unwrap());
        assert_eq!(comps.high, Decimal::from_str_exact("48.00").unwrap());
    }

    #[test]
    fn test_comps_without_price_are_zero() {
        let record = SourceRecord {
            code: None,
            name: "Unpriced".to_owned(),
            brand: None,
            description: None,
            image_url: None,
            price: None,
            attributes: BTreeMap::new(),
        };
        assert_eq!(record.comps(), PriceComps::default());
    }
}
