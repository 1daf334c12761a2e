//! Shared HTTP plumbing for the storefront adapters.

use std::time::Duration;

use crate::error::AdapterError;

/// Build the adapter HTTP client with configured timeout and `User-Agent`.
///
/// # Errors
///
/// Returns [`AdapterError::Network`] if the underlying `reqwest::Client`
/// cannot be constructed (e.g., invalid TLS config).
pub fn build_http_client(
    timeout_secs: u64,
    user_agent: &str,
) -> Result<reqwest::Client, AdapterError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// GET a URL and parse the body as JSON, with optional extra headers.
///
/// # Errors
///
/// - [`AdapterError::Status`] — non-2xx response.
/// - [`AdapterError::Network`] — transport failure.
/// - [`AdapterError::Deserialize`] — body is not valid JSON.
pub async fn fetch_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<serde_json::Value, AdapterError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| AdapterError::Deserialize {
        context: url.to_string(),
        source,
    })
}

/// GET an HTML page, optionally with a session cookie header.
///
/// Returns the body plus the final URL after redirects — storefronts
/// redirect barcode URLs to canonical product pages.
///
/// # Errors
///
/// - [`AdapterError::Status`] — non-2xx response.
/// - [`AdapterError::Network`] — transport failure.
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    cookie: Option<&str>,
) -> Result<(String, String), AdapterError> {
    let mut request = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml");
    if let Some(cookie) = cookie {
        request = request.header(reqwest::header::COOKIE, cookie);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.text().await?;
    Ok((body, final_url))
}

/// Parse a German-formatted displayed price like `"2,95 €"` to euros.
#[must_use]
pub fn parse_displayed_price(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('€', "").trim().replace(',', ".");
    cleaned.parse::<f64>().ok()
}
