//! Storefront adapters and the cross-brand availability orchestrator.

pub mod adapter;
pub mod budni;
pub mod catalog;
pub mod dm;
pub mod error;
pub mod geo;
pub mod hours;
pub mod http;
pub mod mueller;
pub mod orchestrate;
pub mod rossmann;

use std::sync::Arc;
use std::time::Duration;

use vorrat_browser::Browser;
use vorrat_cache::ArtifactCache;
use vorrat_core::{AppConfig, Brand};

pub use adapter::{BrandAdapter, SearchResponse};
pub use budni::BudniAdapter;
pub use catalog::{CatalogProduct, OpenFoodFacts};
pub use dm::DmAdapter;
pub use error::AdapterError;
pub use http::build_http_client;
pub use mueller::MuellerAdapter;
pub use orchestrate::{all_brands_empty, check_availability_across_brands, resolve_across_brands};
pub use rossmann::RossmannAdapter;

/// Cache namespaces the adapters persist session artifacts under; the
/// server preloads these at bootstrap.
pub const CACHE_NAMESPACES: [&str; 3] = [
    dm::CACHE_NAMESPACE,
    rossmann::CACHE_NAMESPACE,
    budni::CACHE_NAMESPACE,
];

/// Build one adapter per active brand, in configured order.
///
/// # Errors
///
/// Returns [`AdapterError`] if the shared HTTP client cannot be built.
pub fn build_adapters(
    config: &AppConfig,
    cache: Arc<ArtifactCache>,
    browser: Arc<dyn Browser>,
) -> Result<Vec<Arc<dyn BrandAdapter>>, AdapterError> {
    let http = build_http_client(config.http_timeout_secs, &config.user_agent)?;
    let intercept_timeout = Duration::from_secs(config.intercept_timeout_secs);

    let adapters = config
        .brands
        .iter()
        .map(|brand| -> Arc<dyn BrandAdapter> {
            match brand {
                Brand::Dm => Arc::new(DmAdapter::new(
                    http.clone(),
                    Arc::clone(&cache),
                    Arc::clone(&browser),
                    intercept_timeout,
                )),
                Brand::Rossmann => Arc::new(RossmannAdapter::new(
                    http.clone(),
                    Arc::clone(&cache),
                    Arc::clone(&browser),
                )),
                Brand::Mueller => Arc::new(MuellerAdapter::new(
                    http.clone(),
                    Arc::clone(&browser),
                    intercept_timeout,
                )),
                Brand::Budni => Arc::new(BudniAdapter::new(
                    http.clone(),
                    Arc::clone(&cache),
                    Arc::clone(&browser),
                )),
            }
        })
        .collect();

    Ok(adapters)
}
