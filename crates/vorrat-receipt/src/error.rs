use thiserror::Error;

use vorrat_core::Brand;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("document does not match the {brand} receipt layout")]
    Layout { brand: Brand },

    #[error("receipt matching is not supported for {brand}")]
    Unsupported { brand: Brand },
}
