//! Receipt-name sanitization: receipts concatenate words, glue digits to
//! letters, and append unit sizes; the search API wants clean lowercase
//! tokens.

use vorrat_core::MatcherTuning;

use crate::dictionary::Dictionary;

const UNITS: [&str; 4] = ["g", "kg", "ml", "l"];

/// Sanitize a raw receipt product name into a search query.
///
/// Boundaries are inserted at casing and letter/digit transitions,
/// everything outside `[a-z0-9äöüß ]` is stripped, unit-size tokens
/// (`250ml`, `1kg` — split into number + unit by the boundary pass) are
/// dropped, and each surviving token is fuzzy-corrected against the
/// dictionary. Tokens of length ≤ 2 survive only if the dictionary knows
/// them verbatim.
#[must_use]
pub fn sanitize_name(raw: &str, dictionary: &Dictionary, tuning: &MatcherTuning) -> String {
    let spaced = insert_boundaries(raw);
    let lowered = spaced.to_lowercase();

    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || "äöüß".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    drop_unit_sizes(&tokens)
        .into_iter()
        .filter(|token| token.chars().count() > 2 || dictionary.contains(token))
        .map(|token| {
            dictionary
                .correct(token, tuning.dict_search_cutoff, tuning.dict_accept_score)
                .unwrap_or(token)
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Insert a space at lower→upper and letter↔digit transitions.
fn insert_boundaries(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut previous: Option<char> = None;

    for current in raw.chars() {
        if let Some(previous) = previous {
            let casing_boundary = previous.is_lowercase() && current.is_uppercase();
            let letter_digit = previous.is_alphabetic() && current.is_ascii_digit();
            let digit_letter = previous.is_ascii_digit() && current.is_alphabetic();
            if casing_boundary || letter_digit || digit_letter {
                out.push(' ');
            }
        }
        out.push(current);
        previous = Some(current);
    }

    out
}

/// Remove unit-size sequences: a numeric token immediately followed by a
/// bare unit (the boundary pass splits `250ml` into `250 ml`).
fn drop_unit_sizes<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];
        let is_number = token.chars().all(|c| c.is_ascii_digit());
        let next_is_unit = tokens
            .get(index + 1)
            .is_some_and(|next| UNITS.contains(next));

        if is_number && next_is_unit {
            index += 2;
            continue;
        }
        kept.push(token);
        index += 1;
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> MatcherTuning {
        MatcherTuning::default()
    }

    #[test]
    fn splits_glued_casing_and_digit_transitions() {
        let dict = Dictionary::builtin();
        assert_eq!(
            sanitize_name("BaleaShampoo", &dict, &tuning()),
            "balea shampoo"
        );
        assert_eq!(sanitize_name("Duschgel250ml", &dict, &tuning()), "duschgel");
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        let dict = Dictionary::builtin();
        assert_eq!(
            sanitize_name("Balea  Shampoo, 2in1!", &dict, &tuning()),
            "balea shampoo"
        );
    }

    #[test]
    fn drops_unit_sizes_but_keeps_other_numbers() {
        let dict = Dictionary::builtin();
        assert_eq!(sanitize_name("Creme 500g", &dict, &tuning()), "creme");
        assert_eq!(sanitize_name("Creme 2l", &dict, &tuning()), "creme");
        assert_eq!(sanitize_name("Creme 500", &dict, &tuning()), "creme 500");
    }

    #[test]
    fn short_tokens_survive_only_via_dictionary() {
        let dict = Dictionary::builtin();
        assert_eq!(sanitize_name("ab Tee", &dict, &tuning()), "tee");
        assert_eq!(sanitize_name("Deo Spray", &dict, &tuning()), "deo spray");
    }

    #[test]
    fn umlauts_are_preserved() {
        let dict = Dictionary::builtin();
        assert_eq!(sanitize_name("Spülung", &dict, &tuning()), "spülung");
    }

    #[test]
    fn tokens_are_fuzzy_corrected_against_the_dictionary() {
        let dict = Dictionary::builtin();
        assert_eq!(
            sanitize_name("Shampo Volumen", &dict, &tuning()),
            "shampoo volumen"
        );
    }
}
