//! The durable Article record: per-brand price, URL, article-number, and
//! availability maps with two independent staleness clocks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use vorrat_core::{AvailabilityRecord, Brand};

use crate::DbError;

/// One article, keyed by EAN. All per-brand maps carry an entry for every
/// active brand; a brand that yielded nothing is explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub ean: String,
    pub name: String,
    /// First non-null image across brands in configured order.
    pub image_url: Option<String>,
    pub prices: BTreeMap<Brand, Option<f64>>,
    pub product_urls: BTreeMap<Brand, Option<String>>,
    pub article_numbers: BTreeMap<Brand, Option<String>>,
    pub store_availability: BTreeMap<Brand, Vec<AvailabilityRecord>>,
    pub price_updated_at: Option<DateTime<Utc>>,
    pub availability_updated_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    /// A bare record with empty maps, before any refresh ran.
    #[must_use]
    pub fn new(ean: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ean: ean.into(),
            name: name.into(),
            image_url: None,
            prices: BTreeMap::new(),
            product_urls: BTreeMap::new(),
            article_numbers: BTreeMap::new(),
            store_availability: BTreeMap::new(),
            price_updated_at: None,
            availability_updated_at: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    ean: String,
    name: String,
    image_url: Option<String>,
    prices: String,
    product_urls: String,
    article_numbers: String,
    store_availability: String,
    price_updated_at: Option<DateTime<Utc>>,
    availability_updated_at: Option<DateTime<Utc>>,
}

fn decode<T: serde::de::DeserializeOwned>(
    column: &'static str,
    raw: &str,
) -> Result<T, DbError> {
    serde_json::from_str(raw).map_err(|source| DbError::Decode { column, source })
}

impl ArticleRow {
    fn into_record(self) -> Result<ArticleRecord, DbError> {
        Ok(ArticleRecord {
            prices: decode("prices", &self.prices)?,
            product_urls: decode("product_urls", &self.product_urls)?,
            article_numbers: decode("article_numbers", &self.article_numbers)?,
            store_availability: decode("store_availability", &self.store_availability)?,
            ean: self.ean,
            name: self.name,
            image_url: self.image_url,
            price_updated_at: self.price_updated_at,
            availability_updated_at: self.availability_updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "ean, name, image_url, prices, product_urls, article_numbers, \
     store_availability, price_updated_at, availability_updated_at";

/// Fetch one article by EAN.
///
/// # Errors
///
/// Returns [`DbError`] on query failure or unreadable stored JSON.
pub async fn get_article(pool: &SqlitePool, ean: &str) -> Result<Option<ArticleRecord>, DbError> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM articles WHERE ean = $1"
    ))
    .bind(ean)
    .fetch_optional(pool)
    .await?;

    row.map(ArticleRow::into_record).transpose()
}

/// Fetch all articles, newest first.
///
/// # Errors
///
/// Returns [`DbError`] on query failure or unreadable stored JSON.
pub async fn list_articles(pool: &SqlitePool) -> Result<Vec<ArticleRecord>, DbError> {
    let rows = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM articles ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ArticleRow::into_record).collect()
}

/// Write the full record, inserting or replacing by EAN.
///
/// The write is whole-row and unguarded: two concurrent refreshes of the
/// same EAN interleave last-write-wins (see DESIGN.md).
///
/// # Errors
///
/// Returns [`DbError`] on query failure.
pub async fn upsert_article(pool: &SqlitePool, article: &ArticleRecord) -> Result<(), DbError> {
    let prices = serde_json::to_string(&article.prices)
        .map_err(|source| DbError::Decode { column: "prices", source })?;
    let product_urls = serde_json::to_string(&article.product_urls)
        .map_err(|source| DbError::Decode { column: "product_urls", source })?;
    let article_numbers = serde_json::to_string(&article.article_numbers)
        .map_err(|source| DbError::Decode { column: "article_numbers", source })?;
    let store_availability = serde_json::to_string(&article.store_availability)
        .map_err(|source| DbError::Decode { column: "store_availability", source })?;

    sqlx::query(
        "INSERT INTO articles \
             (ean, name, image_url, prices, product_urls, article_numbers, \
              store_availability, price_updated_at, availability_updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (ean) DO UPDATE SET \
             name                    = excluded.name, \
             image_url               = excluded.image_url, \
             prices                  = excluded.prices, \
             product_urls            = excluded.product_urls, \
             article_numbers         = excluded.article_numbers, \
             store_availability      = excluded.store_availability, \
             price_updated_at        = excluded.price_updated_at, \
             availability_updated_at = excluded.availability_updated_at",
    )
    .bind(&article.ean)
    .bind(&article.name)
    .bind(&article.image_url)
    .bind(prices)
    .bind(product_urls)
    .bind(article_numbers)
    .bind(store_availability)
    .bind(article.price_updated_at)
    .bind(article.availability_updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete one article by EAN. Returns `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError`] on query failure.
pub async fn delete_article(pool: &SqlitePool, ean: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM articles WHERE ean = $1")
        .bind(ean)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
