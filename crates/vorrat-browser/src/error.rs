use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser capability unavailable in this process")]
    Unavailable,

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Evaluate(String),

    #[error("page operation failed: {0}")]
    Page(String),

    #[error("timed out after {timeout_secs}s waiting for response matching {url_prefix}")]
    InterceptTimeout {
        url_prefix: String,
        timeout_secs: u64,
    },
}
