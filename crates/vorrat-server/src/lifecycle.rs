//! Article lifecycle: create on first unresolved lookup, refresh stale
//! dimensions independently.
//!
//! Price and store availability age on separate clocks; a refresh only
//! re-fetches the dimension whose clock ran out, and brand maps are
//! overwritten with explicit nulls when a brand yields nothing — a
//! previously known price must not outlive its storefront.
//!
//! There is deliberately no concurrency guard on the record: two
//! overlapping refreshes of the same code interleave last-write-wins
//! (see DESIGN.md).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use vorrat_adapters::{
    all_brands_empty, check_availability_across_brands, resolve_across_brands, BrandAdapter,
};
use vorrat_core::{Brand, ProductDetails, ProductRef};
use vorrat_db::{get_article, get_stores_by_brand, upsert_article, ArticleRecord, DbError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no article for {0} and no brand could resolve it")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub struct LifecycleOutcome {
    pub message: &'static str,
    pub article: ArticleRecord,
}

pub struct Lifecycle {
    pool: SqlitePool,
    adapters: Vec<Arc<dyn BrandAdapter>>,
    brands: Vec<Brand>,
    price_threshold: Duration,
    availability_threshold: Duration,
}

impl Lifecycle {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        adapters: Vec<Arc<dyn BrandAdapter>>,
        brands: Vec<Brand>,
        price_threshold_days: i64,
        availability_threshold_days: i64,
    ) -> Self {
        Self {
            pool,
            adapters,
            brands,
            price_threshold: Duration::days(price_threshold_days),
            availability_threshold: Duration::days(availability_threshold_days),
        }
    }

    /// Upsert an article by `(ean, name)`: create it when unknown,
    /// otherwise refresh whichever dimensions have gone stale.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] when the article does not exist and
    /// no brand can resolve the code; [`LifecycleError::Db`] on storage
    /// failure.
    pub async fn upsert_and_refresh(
        &self,
        ean: &str,
        name: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let Some(mut article) = get_article(&self.pool, ean).await? else {
            let article = self.create_article(ean, name).await?;
            return Ok(LifecycleOutcome {
                message: "New article created",
                article,
            });
        };

        let now = Utc::now();
        let price_stale = article
            .price_updated_at
            .is_none_or(|t| now - t > self.price_threshold);
        let availability_stale = article
            .availability_updated_at
            .is_none_or(|t| now - t > self.availability_threshold);

        if price_stale {
            self.refresh_prices(&mut article).await;
        }
        if availability_stale {
            self.refresh_availability(&mut article).await?;
        }

        upsert_article(&self.pool, &article).await?;
        Ok(LifecycleOutcome {
            message: "Article retrieved/updated",
            article,
        })
    }

    /// Refresh the price dimension regardless of staleness.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] when no such article exists.
    pub async fn force_price_refresh(&self, ean: &str) -> Result<ArticleRecord, LifecycleError> {
        let mut article = get_article(&self.pool, ean)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(ean.to_string()))?;
        self.refresh_prices(&mut article).await;
        upsert_article(&self.pool, &article).await?;
        Ok(article)
    }

    /// Refresh the availability dimension regardless of staleness.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] when no such article exists.
    pub async fn force_availability_refresh(
        &self,
        ean: &str,
    ) -> Result<ArticleRecord, LifecycleError> {
        let mut article = get_article(&self.pool, ean)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(ean.to_string()))?;
        self.refresh_availability(&mut article).await?;
        upsert_article(&self.pool, &article).await?;
        Ok(article)
    }

    async fn create_article(&self, ean: &str, name: &str) -> Result<ArticleRecord, LifecycleError> {
        let results = resolve_across_brands(&self.adapters, ean).await;
        if all_brands_empty(&results) {
            return Err(LifecycleError::NotFound(ean.to_string()));
        }

        let mut article = ArticleRecord::new(ean, name);
        for brand in &self.brands {
            let details = results.get(brand).and_then(Option::as_ref);
            article
                .prices
                .insert(*brand, details.and_then(|d| d.price));
            article
                .product_urls
                .insert(*brand, details.and_then(|d| d.url.clone()));
            article
                .article_numbers
                .insert(*brand, details.and_then(|d| d.article_number.clone()));
        }
        article.image_url = self
            .brands
            .iter()
            .filter_map(|brand| results.get(brand).and_then(Option::as_ref))
            .find_map(|details| details.image_url.clone());
        article.price_updated_at = Some(Utc::now());

        self.refresh_availability(&mut article).await?;
        upsert_article(&self.pool, &article).await?;
        Ok(article)
    }

    async fn refresh_prices(&self, article: &mut ArticleRecord) {
        let results = resolve_across_brands(&self.adapters, &article.ean).await;
        for brand in &self.brands {
            let details = results.get(brand).and_then(Option::as_ref);
            article
                .prices
                .insert(*brand, details.and_then(|d| d.price));
            article
                .product_urls
                .insert(*brand, details.and_then(|d| d.url.clone()));
        }
        article.price_updated_at = Some(Utc::now());
    }

    async fn refresh_availability(&self, article: &mut ArticleRecord) -> Result<(), DbError> {
        let references = self.references_from(article);
        let store_ids = self.saved_store_ids().await?;
        let availability =
            check_availability_across_brands(&self.adapters, &references, &store_ids).await;

        for brand in &self.brands {
            article
                .store_availability
                .insert(*brand, availability.get(brand).cloned().unwrap_or_default());
        }
        article.availability_updated_at = Some(Utc::now());
        Ok(())
    }

    /// Each adapter picks its preferred reference from the stored
    /// per-brand URL/article-number maps.
    fn references_from(&self, article: &ArticleRecord) -> BTreeMap<Brand, Option<ProductRef>> {
        self.adapters
            .iter()
            .map(|adapter| {
                let brand = adapter.brand();
                let details = ProductDetails {
                    url: article.product_urls.get(&brand).cloned().flatten(),
                    article_number: article.article_numbers.get(&brand).cloned().flatten(),
                    ..ProductDetails::empty()
                };
                (brand, adapter.availability_reference(&details))
            })
            .collect()
    }

    async fn saved_store_ids(&self) -> Result<BTreeMap<Brand, Vec<String>>, DbError> {
        let mut store_ids = BTreeMap::new();
        for brand in &self.brands {
            let stores = get_stores_by_brand(&self.pool, *brand).await?;
            store_ids.insert(
                *brand,
                stores.into_iter().map(|store| store.store_id).collect(),
            );
        }
        Ok(store_ids)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use vorrat_adapters::AdapterError;
    use vorrat_core::{AvailabilityRecord, StoreListing};

    use super::*;

    /// Test double returning a fixed price, or failing outright.
    struct FakeAdapter {
        brand: Brand,
        price: f64,
        fail: bool,
    }

    impl FakeAdapter {
        fn priced(brand: Brand, price: f64) -> Arc<dyn BrandAdapter> {
            Arc::new(Self {
                brand,
                price,
                fail: false,
            })
        }

        fn failing(brand: Brand) -> Arc<dyn BrandAdapter> {
            Arc::new(Self {
                brand,
                price: 0.0,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl BrandAdapter for FakeAdapter {
        fn brand(&self) -> Brand {
            self.brand
        }

        async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
            if self.fail {
                return Err(AdapterError::NotFound {
                    brand: self.brand,
                    code: code.to_string(),
                });
            }
            Ok(ProductDetails {
                url: Some(format!("https://{}.example/p/{code}", self.brand)),
                name: None,
                price: Some(self.price),
                image_url: Some(format!("https://{}.example/img.png", self.brand)),
                article_number: Some("77".to_string()),
            })
        }

        async fn fetch_product_details(
            &self,
            _reference: &ProductRef,
        ) -> Result<ProductDetails, AdapterError> {
            self.resolve_by_code("unused").await
        }

        async fn check_store_availability(
            &self,
            _reference: &ProductRef,
            store_id: &str,
        ) -> Result<AvailabilityRecord, AdapterError> {
            if self.fail {
                return Err(AdapterError::Timeout {
                    context: "forced".to_string(),
                });
            }
            Ok(AvailabilityRecord {
                store_id: store_id.to_string(),
                available: Some(true),
                quantity: Some(2),
            })
        }

        async fn find_stores(&self, _search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
            Ok(Vec::new())
        }
    }

    fn lifecycle(pool: SqlitePool, adapters: Vec<Arc<dyn BrandAdapter>>) -> Lifecycle {
        let brands = adapters.iter().map(|a| a.brand()).collect();
        Lifecycle::new(pool, adapters, brands, 7, 2)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn total_miss_creates_nothing_and_reports_not_found(pool: SqlitePool) {
        let lc = lifecycle(
            pool.clone(),
            vec![
                FakeAdapter::failing(Brand::Dm),
                FakeAdapter::failing(Brand::Rossmann),
            ],
        );

        let result = lc.upsert_and_refresh("4010355570036", "Shampoo").await;
        assert!(matches!(result, Err(LifecycleError::NotFound(_))));
        assert!(get_article(&pool, "4010355570036").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn creation_fills_every_brand_key_with_explicit_nulls(pool: SqlitePool) {
        let lc = lifecycle(
            pool.clone(),
            vec![
                FakeAdapter::priced(Brand::Dm, 2.95),
                FakeAdapter::failing(Brand::Rossmann),
            ],
        );

        let outcome = lc.upsert_and_refresh("4010355570036", "Shampoo").await.unwrap();
        assert_eq!(outcome.message, "New article created");

        let article = outcome.article;
        assert_eq!(article.prices[&Brand::Dm], Some(2.95));
        // The failed brand is present as an explicit null, not omitted.
        assert!(article.prices.contains_key(&Brand::Rossmann));
        assert_eq!(article.prices[&Brand::Rossmann], None);
        assert!(article.price_updated_at.is_some());
        assert!(article.availability_updated_at.is_some());
        assert_eq!(
            article.image_url.as_deref(),
            Some("https://dm.example/img.png")
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn fresh_price_is_left_untouched_while_stale_availability_refreshes(pool: SqlitePool) {
        // Seed an article priced differently from what the adapter would
        // return now; price clock is fresh, availability clock expired.
        let mut seeded = ArticleRecord::new("4010355570036", "Shampoo");
        seeded.prices.insert(Brand::Dm, Some(1.99));
        seeded
            .product_urls
            .insert(Brand::Dm, Some("https://dm.example/p/old".to_string()));
        seeded.article_numbers.insert(Brand::Dm, Some("77".to_string()));
        seeded.price_updated_at = Some(Utc::now());
        seeded.availability_updated_at = Some(Utc::now() - Duration::days(3));
        upsert_article(&pool, &seeded).await.unwrap();

        let lc = lifecycle(pool.clone(), vec![FakeAdapter::priced(Brand::Dm, 9.99)]);
        let outcome = lc.upsert_and_refresh("4010355570036", "Shampoo").await.unwrap();

        let article = outcome.article;
        // Price dimension untouched: still the seeded value and URL.
        assert_eq!(article.prices[&Brand::Dm], Some(1.99));
        assert_eq!(
            article.product_urls[&Brand::Dm].as_deref(),
            Some("https://dm.example/p/old")
        );
        // Availability clock advanced.
        let refreshed_at = article.availability_updated_at.unwrap();
        assert!(Utc::now() - refreshed_at < Duration::minutes(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stale_price_is_rewritten_from_the_storefronts(pool: SqlitePool) {
        let mut seeded = ArticleRecord::new("4010355570036", "Shampoo");
        seeded.prices.insert(Brand::Dm, Some(1.99));
        seeded.price_updated_at = Some(Utc::now() - Duration::days(8));
        seeded.availability_updated_at = Some(Utc::now());
        upsert_article(&pool, &seeded).await.unwrap();

        let lc = lifecycle(pool.clone(), vec![FakeAdapter::priced(Brand::Dm, 9.99)]);
        let outcome = lc.upsert_and_refresh("4010355570036", "Shampoo").await.unwrap();

        assert_eq!(outcome.article.prices[&Brand::Dm], Some(9.99));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn forced_price_refresh_bypasses_the_staleness_check(pool: SqlitePool) {
        let mut seeded = ArticleRecord::new("4010355570036", "Shampoo");
        seeded.prices.insert(Brand::Dm, Some(1.99));
        seeded.price_updated_at = Some(Utc::now());
        upsert_article(&pool, &seeded).await.unwrap();

        let lc = lifecycle(pool.clone(), vec![FakeAdapter::priced(Brand::Dm, 9.99)]);
        let article = lc.force_price_refresh("4010355570036").await.unwrap();
        assert_eq!(article.prices[&Brand::Dm], Some(9.99));

        let missing = lc.force_price_refresh("0000000000000").await;
        assert!(matches!(missing, Err(LifecycleError::NotFound(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn availability_refresh_covers_saved_stores(pool: SqlitePool) {
        use vorrat_core::{OpeningHours, StoreAddress, StoreData};

        for store_id in ["d-1", "d-2"] {
            let listing = vorrat_core::StoreListing {
                data: StoreData {
                    store_id: store_id.to_string(),
                    store_number: store_id.to_string(),
                    address: StoreAddress::default(),
                    phone: None,
                    coordinates: [53.55, 9.99],
                },
                opening_hours: OpeningHours::default(),
            };
            vorrat_db::save_store(&pool, Brand::Dm, &listing, 4)
                .await
                .unwrap();
        }

        let lc = lifecycle(pool.clone(), vec![FakeAdapter::priced(Brand::Dm, 2.95)]);
        let outcome = lc.upsert_and_refresh("4010355570036", "Shampoo").await.unwrap();

        let records = &outcome.article.store_availability[&Brand::Dm];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].store_id, "d-1");
        assert_eq!(records[1].store_id, "d-2");
    }
}
