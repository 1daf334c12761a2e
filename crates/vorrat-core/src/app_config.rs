use std::net::SocketAddr;
use std::path::PathBuf;

use crate::brands::Brand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Acceptance thresholds for the receipt matcher.
///
/// These were embedded literals in earlier iterations; they are surfaced
/// here so operators can tune match aggressiveness without a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct MatcherTuning {
    /// Worst normalized dictionary distance considered during fuzzy search.
    pub dict_search_cutoff: f64,
    /// Distance below which a dictionary correction replaces the token.
    pub dict_accept_score: f64,
    /// Minimum substring-overlap ratio for a token pair to count as matched.
    pub token_accept_ratio: f64,
    /// Minimum similarity score for a search candidate to be accepted.
    pub candidate_accept_score: f64,
}

impl Default for MatcherTuning {
    fn default() -> Self {
        Self {
            dict_search_cutoff: 0.7,
            dict_accept_score: 0.3,
            token_accept_ratio: 0.5,
            candidate_accept_score: 0.3,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub cache_dir: PathBuf,
    /// Active brands in fan-out order.
    pub brands: Vec<Brand>,
    pub price_threshold_days: i64,
    pub availability_threshold_days: i64,
    pub stores_per_brand: i64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub browser_max_pages: usize,
    pub intercept_timeout_secs: u64,
    pub matcher: MatcherTuning,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("cache_dir", &self.cache_dir)
            .field("brands", &self.brands)
            .field("database_url", &"[redacted]")
            .field("price_threshold_days", &self.price_threshold_days)
            .field(
                "availability_threshold_days",
                &self.availability_threshold_days,
            )
            .field("stores_per_brand", &self.stores_per_brand)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("browser_max_pages", &self.browser_max_pages)
            .field("intercept_timeout_secs", &self.intercept_timeout_secs)
            .field("matcher", &self.matcher)
            .finish()
    }
}
