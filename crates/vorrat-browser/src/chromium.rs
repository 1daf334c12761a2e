//! Chromium engine behind the [`Browser`] trait, pooled with a bounded
//! page cap.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams, EventResponseReceived, GetResponseBodyParams, SetCookiesParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::error::BrowserError;
use crate::{Browser, BrowserPage, InterceptedResponse};

/// How long a plain navigation may take before it is abandoned.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(25);

/// Resolve the Chromium binary: explicit env override first, otherwise
/// chromiumoxide's own detection.
fn chromium_executable() -> Option<PathBuf> {
    std::env::var("VORRAT_CHROMIUM_PATH")
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
}

/// Pooled headless Chromium engine.
///
/// One browser process, at most `max_pages` simultaneously open tabs;
/// callers past the cap queue on the semaphore instead of spawning
/// unbounded contexts.
pub struct ChromiumBrowser {
    browser: Mutex<CdpBrowser>,
    handler_task: JoinHandle<()>,
    permits: Arc<Semaphore>,
    max_pages: usize,
}

impl ChromiumBrowser {
    /// Launch a headless Chromium with the given page cap.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Launch`] when the browser config is invalid
    /// or the process cannot be started.
    pub async fn launch(max_pages: usize) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");

        if let Some(path) = chromium_executable() {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drain CDP events for the lifetime of the browser process.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(max_pages, "headless browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            permits: Arc::new(Semaphore::new(max_pages)),
            max_pages,
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::Unavailable)?;

        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Page(e.to_string()))?
        };

        Ok(Box::new(ChromiumPage {
            page,
            _permit: permit,
        }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser close reported an error");
        }
        let _ = browser.wait().await;
        self.handler_task.abort();
        tracing::info!("headless browser shut down");
        Ok(())
    }

    fn active_pages(&self) -> usize {
        self.max_pages - self.permits.available_permits()
    }
}

/// One Chromium tab holding its pool permit until closed or dropped.
pub struct ChromiumPage {
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let result = tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await;
        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("load exceeded {}s", NAVIGATION_TIMEOUT.as_secs()),
            }),
        }
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.goto(url).await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| BrowserError::Evaluate(format!("result not convertible: {e:?}")))
    }

    async fn navigate_and_intercept(
        &self,
        url: &str,
        url_prefix: &str,
        timeout: Duration,
    ) -> Result<InterceptedResponse, BrowserError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        // Kick the navigation off without awaiting the load: the response
        // we want usually arrives mid-load.
        let navigation = self.page.goto(url);

        let wait = async {
            let (_, matched) = tokio::join!(
                async {
                    if let Err(e) = navigation.await {
                        tracing::debug!(url, error = %e, "navigation error while intercepting");
                    }
                },
                async {
                    while let Some(event) = responses.next().await {
                        if event.response.url.starts_with(url_prefix) {
                            return Some(event);
                        }
                    }
                    None
                }
            );
            matched
        };

        let event = tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| BrowserError::InterceptTimeout {
                url_prefix: url_prefix.to_string(),
                timeout_secs: timeout.as_secs(),
            })?
            .ok_or_else(|| BrowserError::Page("event stream closed".to_string()))?;

        let body = self
            .page
            .execute(GetResponseBodyParams::new(event.request_id.clone()))
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        let raw = if body.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| BrowserError::Page(format!("body not base64: {e}")))?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            body.body.clone()
        };

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| BrowserError::Page(format!("intercepted body not JSON: {e}")))?;

        Ok(InterceptedResponse {
            url: event.response.url.clone(),
            body: parsed,
            request_headers: normalize_headers(
                serde_json::to_value(&event.response.request_headers).unwrap_or_default(),
            ),
        })
    }

    async fn set_cookie(&self, url: &str, name: &str, value: &str) -> Result<(), BrowserError> {
        let cookie = CookieParam::builder()
            .name(name)
            .value(value)
            .url(url)
            .build()
            .map_err(BrowserError::Page)?;

        self.page
            .execute(SetCookiesParams::new(vec![cookie]))
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        Ok(())
    }

    async fn set_local_storage(&self, key: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            "localStorage.setItem({}, {})",
            serde_json::Value::String(key.to_string()),
            serde_json::Value::String(value.to_string()),
        );
        self.evaluate(&script).await.map(|_| ())
    }

    async fn cookie_header(&self) -> Result<String, BrowserError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        Ok(cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "page close reported an error");
        }
        Ok(())
    }
}

/// Lower-case header keys and stringify values; browsers report header
/// maps with mixed casing.
fn normalize_headers(raw: serde_json::Value) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if let serde_json::Value::Object(map) = raw {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            headers.insert(key.to_ascii_lowercase(), rendered);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_headers_lowercases_keys() {
        let raw = serde_json::json!({"X-Token": "abc", "accept": "application/json"});
        let headers = normalize_headers(raw);
        assert_eq!(headers.get("x-token").map(String::as_str), Some("abc"));
        assert_eq!(
            headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn normalize_headers_of_non_object_is_empty() {
        assert!(normalize_headers(serde_json::json!(null)).is_empty());
        assert!(normalize_headers(serde_json::json!("text")).is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires a Chromium binary on the host.
    async fn launch_navigate_evaluate() {
        let browser = ChromiumBrowser::launch(2).await.expect("launch");
        let page = browser.page().await.expect("page");
        page.navigate("data:text/html,<h1>vorrat</h1>")
            .await
            .expect("navigate");
        let value = page
            .evaluate("document.querySelector('h1').textContent")
            .await
            .expect("evaluate");
        assert_eq!(value.as_str(), Some("vorrat"));
        page.close().await.expect("close");
        browser.shutdown().await.expect("shutdown");
    }
}
