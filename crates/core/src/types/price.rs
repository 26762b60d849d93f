//! Price comparables using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Resale price comparables for a product.
///
/// Three reference points gathered from sold-listing data: the original
/// retail price, the high end of recent sales, and the typical sale price.
/// All amounts are in USD; decimal arithmetic avoids float drift when the
/// values round-trip through the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PriceComps {
    /// Original retail price.
    pub retail: Decimal,
    /// High end of recent sold listings.
    pub high: Decimal,
    /// Typical (median) sold price.
    pub typical: Decimal,
}

impl PriceComps {
    /// Create a new set of comparables.
    #[must_use]
    pub const fn new(retail: Decimal, high: Decimal, typical: Decimal) -> Self {
        Self {
            retail,
            high,
            typical,
        }
    }

    /// Build comparables from a single observed price.
    ///
    /// Used when the external source supplies only one price point: the
    /// observed price becomes both retail and typical, with the high comp
    /// marked up by 20%.
    #[must_use]
    pub fn from_single_price(price: Decimal) -> Self {
        let markup = Decimal::new(12, 1); // 1.2
        Self {
            retail: price,
            high: price * markup,
            typical: price,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_from_single_price() {
        let comps = PriceComps::from_single_price(dec("10.00"));
        assert_eq!(comps.retail, dec("10.00"));
        assert_eq!(comps.typical, dec("10.00"));
        assert_eq!(comps.high, dec("12.00"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let comps = PriceComps::new(dec("59.99"), dec("80"), dec("45.50"));
        let json = serde_json::to_string(&comps).unwrap();
        let back: PriceComps = serde_json::from_str(&json).unwrap();
        assert_eq!(back, comps);
    }
}
