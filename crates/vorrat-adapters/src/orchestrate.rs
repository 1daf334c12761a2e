//! Fan-out across the configured brand adapters.
//!
//! Every per-brand operation is individually wrapped: one storefront
//! failing (network, parse, timeout, not-found) degrades that brand to a
//! neutral empty result and never aborts its siblings. All brands are
//! awaited before returning; results are keyed by brand identity, not by
//! completion order.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef};

use crate::adapter::BrandAdapter;
use crate::error::AdapterError;

/// Resolve a product code on every adapter concurrently.
///
/// A brand that failed or found nothing maps to `None` — the caller
/// treats the whole lookup as not-found only when [`all_brands_empty`].
pub async fn resolve_across_brands(
    adapters: &[Arc<dyn BrandAdapter>],
    code: &str,
) -> BTreeMap<Brand, Option<ProductDetails>> {
    let tasks = adapters.iter().map(|adapter| {
        let adapter = Arc::clone(adapter);
        let code = code.to_string();
        async move {
            let brand = adapter.brand();
            match adapter.resolve_by_code(&code).await {
                Ok(details) => (brand, Some(details)),
                Err(e) => {
                    log_degraded(brand, &code, &e);
                    (brand, None)
                }
            }
        }
    });

    join_all(tasks).await.into_iter().collect()
}

/// Check availability for each brand's reference across that brand's
/// saved stores, all brands concurrently.
///
/// Brands without a reference, without saved stores, or whose adapter
/// failed map to an empty list.
pub async fn check_availability_across_brands(
    adapters: &[Arc<dyn BrandAdapter>],
    references: &BTreeMap<Brand, Option<ProductRef>>,
    store_ids: &BTreeMap<Brand, Vec<String>>,
) -> BTreeMap<Brand, Vec<AvailabilityRecord>> {
    let tasks = adapters.iter().map(|adapter| {
        let adapter = Arc::clone(adapter);
        let brand = adapter.brand();
        let reference = references.get(&brand).cloned().flatten();
        let stores = store_ids.get(&brand).cloned().unwrap_or_default();

        async move {
            let Some(reference) = reference else {
                return (brand, Vec::new());
            };

            match brand_availability(&*adapter, &reference, &stores).await {
                Ok(records) => (brand, records),
                Err(e) => {
                    log_degraded(brand, reference.as_str(), &e);
                    (brand, Vec::new())
                }
            }
        }
    });

    join_all(tasks).await.into_iter().collect()
}

async fn brand_availability(
    adapter: &dyn BrandAdapter,
    reference: &ProductRef,
    store_ids: &[String],
) -> Result<Vec<AvailabilityRecord>, AdapterError> {
    let checks = store_ids
        .iter()
        .map(|store_id| adapter.check_store_availability(reference, store_id));

    join_all(checks).await.into_iter().collect()
}

/// `true` when no brand produced anything — the only condition under
/// which a cross-brand lookup reports not-found to its caller.
#[must_use]
pub fn all_brands_empty(results: &BTreeMap<Brand, Option<ProductDetails>>) -> bool {
    results.values().all(Option::is_none)
}

fn log_degraded(brand: Brand, subject: &str, error: &AdapterError) {
    if error.is_not_found() {
        tracing::debug!(%brand, subject, "brand yielded no match");
    } else {
        tracing::warn!(%brand, subject, error = %error, "brand degraded to empty result");
    }
}
