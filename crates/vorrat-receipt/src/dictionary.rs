//! Static product-word dictionary used to repair OCR/abbreviation damage
//! in receipt tokens before they hit the search API.

use strsim::jaro_winkler;

/// Common German drugstore vocabulary: product categories and the house
/// and manufacturer brands that dominate receipt lines.
pub static GERMAN_PRODUCT_WORDS: &[&str] = &[
    // categories
    "shampoo",
    "spülung",
    "duschgel",
    "duschbad",
    "badesalz",
    "seife",
    "creme",
    "handcreme",
    "sonnencreme",
    "bodylotion",
    "lotion",
    "balsam",
    "peeling",
    "maske",
    "deo",
    "deospray",
    "haarspray",
    "haargel",
    "zahncreme",
    "zahnpasta",
    "zahnbürste",
    "mundspülung",
    "rasierer",
    "klingen",
    "rasiergel",
    "wattepads",
    "wattestäbchen",
    "taschentücher",
    "feuchttücher",
    "toilettenpapier",
    "küchenrolle",
    "waschmittel",
    "waschgel",
    "weichspüler",
    "spülmittel",
    "reiniger",
    "allzweckreiniger",
    "windeln",
    "babybrei",
    "pflaster",
    "verband",
    "tabletten",
    "kapseln",
    "vitamin",
    "nagellack",
    "makeup",
    "mascara",
    "lippenstift",
    // groceries carried by drugstores
    "müsli",
    "riegel",
    "tee",
    "kaffee",
    "saft",
    "wasser",
    "milch",
    "hafermilch",
    "joghurt",
    "honig",
    "marmelade",
    "schokolade",
    "chips",
    "nüsse",
    "reis",
    "nudeln",
    // house and manufacturer brands
    "balea",
    "alverde",
    "mivolis",
    "denkmit",
    "profissimo",
    "isana",
    "altapharma",
    "domol",
    "enerbio",
    "elkos",
    "nivea",
    "kneipp",
    "tetesept",
    "colgate",
    "elmex",
    "oralb",
    "gillette",
    "persil",
    "ariel",
    "lenor",
    "somat",
    "pril",
    "frosch",
    "pampers",
    "penaten",
    "bebe",
];

pub struct Dictionary {
    words: Vec<String>,
}

impl Dictionary {
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_words(GERMAN_PRODUCT_WORDS.iter().map(|w| (*w).to_string()))
    }

    pub fn with_words(words: impl IntoIterator<Item = String>) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.words.iter().any(|w| w == token)
    }

    /// Fuzzy-correct a token against the dictionary.
    ///
    /// Distance is `1 − jaro_winkler`; candidates worse than
    /// `search_cutoff` are never considered, and a correction is applied
    /// only when the best candidate's distance is below `accept_score`.
    /// Returns `None` when the token should be kept as-is.
    #[must_use]
    pub fn correct(&self, token: &str, search_cutoff: f64, accept_score: f64) -> Option<&str> {
        let mut best: Option<(f64, &str)> = None;

        for word in &self.words {
            let distance = 1.0 - jaro_winkler(token, word);
            if distance > search_cutoff {
                continue;
            }
            if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                best = Some((distance, word));
            }
        }

        best.filter(|(distance, _)| *distance < accept_score)
            .map(|(_, word)| word)
    }
}
