//! Receipt-matching engine: raw point-of-sale text in, catalog
//! references out.
//!
//! The pipeline extracts text from the uploaded PDF, cuts out the
//! brand-specific product region, parses each line, sanitizes and
//! fuzzy-corrects the product name, and matches it against live or
//! cached brand search results using a substring-overlap similarity
//! score. Lines that match nothing are dropped silently; only an
//! unreadable document is fatal.

pub mod dictionary;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod parse;
pub mod sanitize;
pub mod similarity;

pub use dictionary::Dictionary;
pub use error::ReceiptError;
pub use extract::extract_text;
pub use matcher::{CodeLookup, MatchedItem, NamedProduct, ReceiptMatcher};
pub use parse::{CodedLineItem, ReceiptLineItem};
pub use sanitize::sanitize_name;
pub use similarity::{longest_common_substring, price_boundary, similarity_score};
