use thiserror::Error;

use vorrat_browser::BrowserError;
use vorrat_core::Brand;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("expected structure missing in {context}")]
    Parse { context: String },

    #[error("JSON shape mismatch for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timed out waiting on {context}")]
    Timeout { context: String },

    #[error("no unambiguous {brand} match for {code}")]
    NotFound { brand: Brand, code: String },

    #[error("browser automation failed: {0}")]
    Automation(String),
}

impl AdapterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound { .. })
    }
}

impl From<BrowserError> for AdapterError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::InterceptTimeout {
                url_prefix,
                timeout_secs,
            } => AdapterError::Timeout {
                context: format!("response matching {url_prefix} ({timeout_secs}s)"),
            },
            other => AdapterError::Automation(other.to_string()),
        }
    }
}
