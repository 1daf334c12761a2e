//! Token-overlap similarity between receipt text and catalog titles.
//!
//! Receipt lines abbreviate aggressively ("BALEA SHP VOLUM"), so exact
//! token equality is useless. The score instead rewards partial
//! *substring* overlap per token pair, which tolerates brand prefixes and
//! truncated suffixes that differ between the receipt and the catalog.

/// Length of the longest contiguous run of matching characters.
#[must_use]
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    let mut longest = 0;

    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb { previous[j] + 1 } else { 0 };
            longest = longest.max(current[j + 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    longest
}

/// Greedy token-overlap score between two strings.
///
/// Both strings are tokenized on whitespace. Each token of `a`, in order,
/// claims the yet-unclaimed token of `b` with the highest
/// `LCS / min(len)` ratio; claims below `accept_ratio` are discarded.
/// The accumulated ratios are normalized by the average token count, so
/// identical single tokens score exactly `1.0`.
#[must_use]
pub fn similarity_score(a: &str, b: &str, accept_ratio: f64) -> f64 {
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut matched_b = vec![false; tokens_b.len()];
    let mut accumulator = 0.0;

    for token_a in &tokens_a {
        let len_a = token_a.chars().count();
        let mut best_ratio = 0.0;
        let mut best_index = None;

        for (index, token_b) in tokens_b.iter().enumerate() {
            if matched_b[index] {
                continue;
            }
            let len_b = token_b.chars().count();
            let lcs = longest_common_substring(token_a, token_b);
            #[allow(clippy::cast_precision_loss)]
            let ratio = lcs as f64 / len_a.min(len_b) as f64;
            if ratio > best_ratio {
                best_ratio = ratio;
                best_index = Some(index);
            }
        }

        if best_ratio > accept_ratio {
            if let Some(index) = best_index {
                accumulator += best_ratio;
                matched_b[index] = true;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let average_count = (tokens_a.len() + tokens_b.len()) as f64 / 2.0;
    accumulator / average_count
}

/// The `[floor(price), ceil(price)]` window used to pre-filter search
/// candidates by displayed price.
#[must_use]
pub fn price_boundary(price: f64) -> (i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    (price.floor() as i64, price.ceil() as i64)
}
