//! Raw text extraction from uploaded receipt documents.

use crate::error::ReceiptError;

/// Extract plain text from a PDF, pages concatenated in order.
///
/// # Errors
///
/// Returns [`ReceiptError::Pdf`] when the bytes are not a readable PDF.
pub fn extract_text(bytes: &[u8]) -> Result<String, ReceiptError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ReceiptError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_a_typed_error() {
        let result = extract_text(b"not a pdf");
        assert!(matches!(result, Err(ReceiptError::Pdf(_))));
    }
}
