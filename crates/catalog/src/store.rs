//! Catalog store repository.
//!
//! # Table: `product`
//!
//! Written only by the sync job; read by the identification gateway. The
//! `code` column is the stable natural key: inserts set it once, updates
//! never touch it.
//!
//! # Migrations
//!
//! The `product` table is created by the server crate's migrations and run via:
//! ```bash
//! cargo run -p quicklist-cli -- migrate
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use thiserror::Error;

use quicklist_core::{PriceComps, ProductCode, ProductId};

use crate::model::{Product, SourceRecord};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Whether an upsert created a new row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted (code freshly assigned or first seen).
    Inserted,
    /// An existing row's mutable fields were overwritten.
    Updated,
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    code: String,
    name: String,
    brand: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    comp_retail: Decimal,
    comp_high: Decimal,
    comp_typical: Decimal,
    attributes: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let code = ProductCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product code in database: {e}"))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            code,
            name: row.name,
            brand: row.brand,
            description: row.description,
            image_url: row.image_url,
            comps: PriceComps::new(row.comp_retail, row.comp_high, row.comp_typical),
            attributes: row.attributes.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, code, name, brand, description, image_url, \
     comp_retail, comp_high, comp_typical, attributes, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog product operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by its identifying code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row data is invalid.
    pub async fn find_by_code(
        &self,
        code: &ProductCode,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Batch-fetch products for a set of candidate codes in one query.
    ///
    /// Codes with no matching row are simply absent from the result; the
    /// external index and the store are allowed to drift.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if any row data is invalid.
    pub async fn find_by_codes(
        &self,
        codes: &[ProductCode],
    ) -> Result<Vec<Product>, RepositoryError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let code_strings: Vec<String> =
            codes.iter().map(|c| c.as_str().to_owned()).collect();

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE code = ANY($1)"
        ))
        .bind(&code_strings)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Find a product by exact (case-insensitive) display name.
    ///
    /// This is the documented fallback for sources that supply no stable
    /// identifier. It is a known drift risk: two differently named listings
    /// of the same physical product will both insert. The stable code is
    /// the real key; anything fuzzier than exact equality is rejected.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row data is invalid.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE lower(name) = lower($1) LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List every identifying code in the catalog.
    ///
    /// Used by refresh-mode sync runs, which re-query the source for each
    /// existing code instead of a configured term list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored code is invalid.
    pub async fn all_codes(&self) -> Result<Vec<ProductCode>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT code FROM product ORDER BY code")
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|(code,)| {
                ProductCode::parse(&code).map_err(|e| {
                    RepositoryError::DataCorruption(format!(
                        "invalid product code in database: {e}"
                    ))
                })
            })
            .collect()
    }

    /// Upsert a normalized source record.
    ///
    /// Matching order: exact `code` when the source supplied one, else
    /// exact display-name match (see [`Self::find_by_name`]), else insert
    /// with a freshly allocated local code. On a match the mutable fields
    /// (name, brand, description, image, comps, attributes) are
    /// overwritten; the identifying code is never touched.
    ///
    /// The whole operation commits as one transaction, so a re-run with
    /// identical input yields exactly one row per code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    /// Returns `RepositoryError::Conflict` on a concurrent duplicate insert.
    pub async fn upsert(
        &self,
        record: &SourceRecord,
    ) -> Result<(Product, UpsertOutcome), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Resolve the target code: source-supplied, name-matched, or fresh.
        let (code, exists) = match &record.code {
            Some(code) => {
                let found: Option<(i32,)> =
                    sqlx::query_as("SELECT id FROM product WHERE code = $1")
                        .bind(code.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;
                (code.clone(), found.is_some())
            }
            None => {
                let found: Option<(String,)> = sqlx::query_as(
                    "SELECT code FROM product WHERE lower(name) = lower($1) LIMIT 1",
                )
                .bind(&record.name)
                .fetch_optional(&mut *tx)
                .await?;

                match found {
                    Some((code,)) => {
                        let code = ProductCode::parse(&code).map_err(|e| {
                            RepositoryError::DataCorruption(format!(
                                "invalid product code in database: {e}"
                            ))
                        })?;
                        (code, true)
                    }
                    None => (ProductCode::generate(), false),
                }
            }
        };

        let comps = record.comps();

        let row: ProductRow = if exists {
            sqlx::query_as(&format!(
                "UPDATE product
                 SET name = $2, brand = $3, description = $4, image_url = $5,
                     comp_retail = $6, comp_high = $7, comp_typical = $8,
                     attributes = $9, updated_at = now()
                 WHERE code = $1
                 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(code.as_str())
            .bind(&record.name)
            .bind(record.brand.as_deref())
            .bind(record.description.as_deref())
            .bind(record.image_url.as_deref())
            .bind(comps.retail)
            .bind(comps.high)
            .bind(comps.typical)
            .bind(Json(&record.attributes))
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as(&format!(
                "INSERT INTO product
                     (code, name, brand, description, image_url,
                      comp_retail, comp_high, comp_typical, attributes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(code.as_str())
            .bind(&record.name)
            .bind(record.brand.as_deref())
            .bind(record.description.as_deref())
            .bind(record.image_url.as_deref())
            .bind(comps.retail)
            .bind(comps.high)
            .bind(comps.typical)
            .bind(Json(&record.attributes))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict(format!(
                        "product code already exists: {code}"
                    ));
                }
                RepositoryError::Database(e)
            })?
        };

        tx.commit().await?;

        let outcome = if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };

        Ok((row.try_into()?, outcome))
    }
}
