//! Brand-specific receipt layouts: region splitting and line grammars.

use regex::Regex;

/// The dm receipt ends its product region at the total line.
const DM_REGION_END: &str = "SUMME EUR";
/// Rossmann receipts frame the product region with dashed rulers.
const ROSSMANN_DELIMITER: &str =
    "--------------------------------------------------------";

/// One parsed product line: sanitizable name, per-unit price, quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLineItem {
    pub product_name: String,
    pub price: f64,
    pub quantity: u32,
    /// Numeric code trailing the price; meaning not established, kept
    /// opaque.
    pub trailing_code: String,
}

/// A Rossmann line additionally carries the product's barcode.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedLineItem {
    pub ean: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

/// The dm product region: everything above `SUMME EUR`, minus the three
/// receipt-header lines and the final fragment before the total marker.
#[must_use]
pub fn dm_product_region(full_text: &str) -> Option<Vec<&str>> {
    let (above, _) = full_text.split_once(DM_REGION_END)?;
    let lines: Vec<&str> = above.split('\n').collect();
    if lines.len() <= 4 {
        return Some(Vec::new());
    }
    Some(lines[3..lines.len() - 1].to_vec())
}

/// Parse one dm product line.
///
/// Grammar: optional leading `Nx ` multiplier, then
/// `name  total-price(d+,dd)  trailing-code(d+)`. A multi-unit total is
/// divided back into the per-unit price.
#[must_use]
pub fn parse_dm_line(line: &str) -> Option<ReceiptLineItem> {
    let multiplier_re = Regex::new(r"^(\d+)x\s+").expect("valid regex");
    let line_re = Regex::new(r"^(.+?)\s+(\d+,\d{2})\s+(\d+)$").expect("valid regex");

    let mut quantity = 1u32;
    let mut rest = line;
    if let Some(capture) = multiplier_re.captures(line) {
        quantity = capture[1].parse().ok()?;
        rest = &line[capture[0].len()..];
    }

    let capture = line_re.captures(rest)?;
    let product_name = capture[1].trim().to_string();
    let mut price: f64 = capture[2].replace(',', ".").parse().ok()?;
    let trailing_code = capture[3].to_string();

    if quantity != 1 {
        price /= f64::from(quantity);
    }

    Some(ReceiptLineItem {
        product_name,
        price,
        quantity,
        trailing_code,
    })
}

/// The Rossmann product region: the text between the first pair of
/// dashed delimiter lines.
#[must_use]
pub fn rossmann_product_region(full_text: &str) -> Option<Vec<&str>> {
    let mut parts = full_text.split(ROSSMANN_DELIMITER);
    let _before = parts.next()?;
    let region = parts.next()?;
    Some(region.split('\n').filter(|line| !line.is_empty()).collect())
}

/// Parse one Rossmann product line.
///
/// The PDF extractor renders column separators as `♥` runs; the grammar
/// is: optional `NX` multiplier, barcode, name, then one or two
/// `€d+,dd` amounts — the second, when present, is the effective price.
#[must_use]
pub fn parse_rossmann_line(line: &str) -> Option<CodedLineItem> {
    let line_re = Regex::new(
        r"^(?:'?)♥(?:(?P<qty>\d+)X)?♥+(?P<ean>\d+)♥+(?P<name>.+?)♥+€(?P<price1>\d+,\d{2})(?:♥+€(?P<price2>\d+,\d{2}))?",
    )
    .expect("valid regex");

    let capture = line_re.captures(line)?;

    let quantity = capture
        .name("qty")
        .map_or(Some(1), |m| m.as_str().parse().ok())?;
    let price_raw = capture
        .name("price2")
        .or_else(|| capture.name("price1"))?
        .as_str();
    let price: f64 = price_raw.replace(',', ".").parse().ok()?;

    let heart_re = Regex::new("♥+").expect("valid regex");
    let name = heart_re
        .replace_all(capture.name("name")?.as_str(), " ")
        .trim()
        .to_string();

    Some(CodedLineItem {
        ean: capture.name("ean")?.as_str().to_string(),
        name,
        price,
        quantity,
    })
}
