//! Saved-store directory: brand-scoped rows with an enforced per-brand cap.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use vorrat_core::{Brand, OpeningHours, StoreAddress, StoreData, StoreListing};

use crate::DbError;

/// Outcome of a save attempt, surfaced verbatim to the API caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    pub message: String,
}

/// One saved store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub store_id: String,
    pub store_number: String,
    pub brand: Brand,
    pub address: StoreAddress,
    pub phone: Option<String>,
    /// `[latitude, longitude]`.
    pub coordinates: [f64; 2],
    pub opening_hours: OpeningHours,
    pub created_at: DateTime<Utc>,
}

impl StoreRecord {
    /// Render as the listing shape shared with directory search results.
    #[must_use]
    pub fn to_listing(&self) -> StoreListing {
        StoreListing {
            data: StoreData {
                store_id: self.store_id.clone(),
                store_number: self.store_number.clone(),
                address: self.address.clone(),
                phone: self.phone.clone(),
                coordinates: self.coordinates,
            },
            opening_hours: self.opening_hours.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    store_id: String,
    store_number: String,
    brand: String,
    address: String,
    phone: Option<String>,
    latitude: f64,
    longitude: f64,
    opening_hours: String,
    created_at: DateTime<Utc>,
}

impl StoreRow {
    fn into_record(self) -> Result<StoreRecord, DbError> {
        let brand: Brand = self
            .brand
            .parse()
            .map_err(|_| DbError::Decode {
                column: "brand",
                source: serde::de::Error::custom(format!("unknown brand '{}'", self.brand)),
            })?;
        let address: StoreAddress = serde_json::from_str(&self.address)
            .map_err(|source| DbError::Decode { column: "address", source })?;
        let opening_hours: OpeningHours = serde_json::from_str(&self.opening_hours)
            .map_err(|source| DbError::Decode { column: "opening_hours", source })?;

        Ok(StoreRecord {
            store_id: self.store_id,
            store_number: self.store_number,
            brand,
            address,
            phone: self.phone,
            coordinates: [self.latitude, self.longitude],
            opening_hours,
            created_at: self.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "store_id, store_number, brand, address, phone, latitude, longitude, \
     opening_hours, created_at";

/// Save a store for a brand, enforcing id uniqueness and the per-brand cap.
///
/// A refused save persists nothing and reports why in the outcome message;
/// only infrastructure failures surface as errors.
///
/// # Errors
///
/// Returns [`DbError`] on query failure.
pub async fn save_store(
    pool: &SqlitePool,
    brand: Brand,
    listing: &StoreListing,
    cap: i64,
) -> Result<SaveOutcome, DbError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stores WHERE store_id = $1)")
            .bind(&listing.data.store_id)
            .fetch_one(pool)
            .await?;
    if exists {
        return Ok(SaveOutcome {
            success: false,
            message: "Store with this ID already exists".to_string(),
        });
    }

    let brand_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores WHERE brand = $1")
        .bind(brand.as_str())
        .fetch_one(pool)
        .await?;
    if brand_count >= cap {
        return Ok(SaveOutcome {
            success: false,
            message: format!("Brand store limit ({cap}) reached"),
        });
    }

    let address = serde_json::to_string(&listing.data.address)
        .map_err(|source| DbError::Decode { column: "address", source })?;
    let opening_hours = serde_json::to_string(&listing.opening_hours)
        .map_err(|source| DbError::Decode { column: "opening_hours", source })?;

    sqlx::query(
        "INSERT INTO stores \
             (store_id, store_number, brand, address, phone, latitude, longitude, opening_hours) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&listing.data.store_id)
    .bind(&listing.data.store_number)
    .bind(brand.as_str())
    .bind(address)
    .bind(&listing.data.phone)
    .bind(listing.data.coordinates[0])
    .bind(listing.data.coordinates[1])
    .bind(opening_hours)
    .execute(pool)
    .await?;

    Ok(SaveOutcome {
        success: true,
        message: "Store added successfully".to_string(),
    })
}

/// All saved stores of one brand, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] on query failure or unreadable stored JSON.
pub async fn get_stores_by_brand(
    pool: &SqlitePool,
    brand: Brand,
) -> Result<Vec<StoreRecord>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM stores WHERE brand = $1 ORDER BY created_at ASC"
    ))
    .bind(brand.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(StoreRow::into_record).collect()
}

/// One saved store by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when no row matches.
pub async fn get_store_by_id(pool: &SqlitePool, store_id: &str) -> Result<StoreRecord, DbError> {
    let row = sqlx::query_as::<_, StoreRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM stores WHERE store_id = $1"
    ))
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)?.into_record()
}

/// Delete one saved store. Returns `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError`] on query failure.
pub async fn delete_store_by_id(pool: &SqlitePool, store_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM stores WHERE store_id = $1")
        .bind(store_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
