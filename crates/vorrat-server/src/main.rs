mod api;
mod lifecycle;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use vorrat_adapters::{build_adapters, OpenFoodFacts, CACHE_NAMESPACES};
use vorrat_browser::{Browser, ChromiumBrowser, UnavailableBrowser};
use vorrat_cache::ArtifactCache;
use vorrat_receipt::ReceiptMatcher;

use crate::api::{build_app, AppState};
use crate::lifecycle::Lifecycle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(vorrat_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = vorrat_db::connect_pool(&config.database_url, vorrat_db::PoolConfig::default()).await?;
    vorrat_db::run_migrations(&pool).await?;

    let cache = Arc::new(ArtifactCache::new(config.cache_dir.clone()));
    for namespace in CACHE_NAMESPACES {
        cache.load(namespace).await;
    }

    let browser: Arc<dyn Browser> = match ChromiumBrowser::launch(config.browser_max_pages).await {
        Ok(browser) => Arc::new(browser),
        Err(e) => {
            tracing::warn!(error = %e, "no usable Chromium; browser-dependent adapter paths disabled");
            Arc::new(UnavailableBrowser)
        }
    };

    let adapters = build_adapters(&config, Arc::clone(&cache), Arc::clone(&browser))?;
    let http = vorrat_adapters::build_http_client(config.http_timeout_secs, &config.user_agent)?;

    let lifecycle = Lifecycle::new(
        pool.clone(),
        adapters.clone(),
        config.brands.clone(),
        config.price_threshold_days,
        config.availability_threshold_days,
    );

    let state = AppState {
        pool,
        config: Arc::clone(&config),
        adapters: Arc::new(adapters),
        lifecycle: Arc::new(lifecycle),
        matcher: Arc::new(ReceiptMatcher::new(config.matcher)),
        catalog: Arc::new(OpenFoodFacts::new(http)),
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, brands = ?config.brands, "vorrat listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = browser.shutdown().await {
        tracing::warn!(error = %e, "browser shutdown reported an error");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
