//! Generic "drive a headless browser page" capability.
//!
//! Adapters consume the [`Browser`]/[`BrowserPage`] traits; the concrete
//! engine is Chromium via chromiumoxide, owned as an explicit
//! process-scoped pool with a bounded page cap rather than an ambient
//! singleton. Requests beyond the cap queue on the pool semaphore.

pub mod chromium;
pub mod error;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

pub use chromium::ChromiumBrowser;
pub use error::BrowserError;

/// A network response captured while loading a page.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub url: String,
    /// Parsed JSON body of the matched response.
    pub body: serde_json::Value,
    /// Request headers the browser actually sent, keys lower-cased.
    pub request_headers: BTreeMap<String, String>,
}

/// A browser engine that can hand out page contexts.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Acquire a page, waiting if the pool is at capacity.
    async fn page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// Shut the engine down. Idempotent.
    async fn shutdown(&self) -> Result<(), BrowserError>;

    /// Number of pages currently checked out.
    fn active_pages(&self) -> usize;
}

/// A single browser page (tab).
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Navigate to `url` and wait for a response whose URL starts with
    /// `url_prefix`, bounded by `timeout`.
    ///
    /// The listener is registered before navigation starts, so responses
    /// triggered by the navigation itself are caught.
    async fn navigate_and_intercept(
        &self,
        url: &str,
        url_prefix: &str,
        timeout: Duration,
    ) -> Result<InterceptedResponse, BrowserError>;

    /// Set a cookie scoped to `url`.
    async fn set_cookie(&self, url: &str, name: &str, value: &str) -> Result<(), BrowserError>;

    /// Seed a `localStorage` entry on the current origin.
    async fn set_local_storage(&self, key: &str, value: &str) -> Result<(), BrowserError>;

    /// Current cookies rendered as a `name=value; …` request header.
    async fn cookie_header(&self) -> Result<String, BrowserError>;

    /// Release the page back to the pool.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Stand-in engine for processes running without a usable Chromium.
///
/// HTTP-only adapter paths keep working; anything that needs a page gets
/// a typed error instead of a crash at startup.
pub struct UnavailableBrowser;

#[async_trait]
impl Browser for UnavailableBrowser {
    async fn page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Err(BrowserError::Unavailable)
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    fn active_pages(&self) -> usize {
        0
    }
}
