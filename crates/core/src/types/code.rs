//! Product identifying code type.
//!
//! The identifying code is the stable key shared between the catalog store
//! and the external matching index. It is assigned once (either supplied by
//! the product-data source or allocated locally) and never changes for the
//! lifetime of a product row.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a [`ProductCode`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum ProductCodeError {
    /// The input string is empty after trimming.
    #[error("product code cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("product code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace.
    #[error("product code cannot contain whitespace")]
    Whitespace,
}

/// A product identifying code.
///
/// Locally allocated codes use the `QL-` prefix followed by 12 hex
/// characters; codes sourced from an external feed keep whatever stable
/// identifier the feed supplied.
///
/// ## Examples
///
/// ```
/// use quicklist_core::ProductCode;
///
/// assert!(ProductCode::parse("ABC123").is_ok());
/// assert!(ProductCode::parse("  ABC123  ").is_ok()); // trimmed
/// assert!(ProductCode::parse("").is_err());
/// assert!(ProductCode::parse("AB C").is_err());
///
/// let fresh = ProductCode::generate();
/// assert!(fresh.as_str().starts_with("QL-"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProductCode(String);

impl ProductCode {
    /// Maximum length of an identifying code.
    pub const MAX_LENGTH: usize = 64;

    /// Prefix for locally allocated codes.
    pub const LOCAL_PREFIX: &'static str = "QL-";

    /// Parse a `ProductCode` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 64
    /// characters, or contains interior whitespace.
    pub fn parse(s: &str) -> Result<Self, ProductCodeError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ProductCodeError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ProductCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(ProductCodeError::Whitespace);
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Allocate a fresh locally scoped code.
    ///
    /// Used by the catalog sync job when the external source did not supply
    /// a stable identifier of its own.
    #[must_use]
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        let suffix: String = uuid.chars().take(12).collect();
        Self(format!("{}{}", Self::LOCAL_PREFIX, suffix.to_uppercase()))
    }

    /// Returns true if this code was allocated locally rather than sourced
    /// from an external feed.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ProductCode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductCode {
    type Err = ProductCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ProductCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ProductCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ProductCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ProductCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(ProductCode::parse("ABC123").unwrap().as_str(), "ABC123");
        assert_eq!(ProductCode::parse("  ABC123 ").unwrap().as_str(), "ABC123");
        assert!(ProductCode::parse("QL-DEADBEEF0001").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(ProductCode::parse(""), Err(ProductCodeError::Empty)));
        assert!(matches!(
            ProductCode::parse("   "),
            Err(ProductCodeError::Empty)
        ));
    }

    #[test]
    fn test_parse_whitespace() {
        assert!(matches!(
            ProductCode::parse("AB C"),
            Err(ProductCodeError::Whitespace)
        ));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "X".repeat(65);
        assert!(matches!(
            ProductCode::parse(&long),
            Err(ProductCodeError::TooLong { .. })
        ));
    }

    #[test]
    fn test_generate_shape() {
        let code = ProductCode::generate();
        assert!(code.is_local());
        assert_eq!(code.as_str().len(), ProductCode::LOCAL_PREFIX.len() + 12);
        assert!(ProductCode::parse(code.as_str()).is_ok());
    }

    #[test]
    fn test_generate_unique() {
        let a = ProductCode::generate();
        let b = ProductCode::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sourced_code_not_local() {
        assert!(!ProductCode::parse("B07XJ8C8F5").unwrap().is_local());
    }
}
