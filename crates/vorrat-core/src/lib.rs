//! Shared configuration and brand identity for the vorrat workspace.

pub mod app_config;
pub mod brands;
pub mod config;
pub mod products;
pub mod stores;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, MatcherTuning};
pub use brands::Brand;
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{AvailabilityRecord, ProductDetails, ProductRef, SearchHit};
pub use stores::{OpenInterval, OpeningHours, StoreAddress, StoreData, StoreListing};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
