use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The four storefronts vorrat integrates with.
///
/// The variant order is the canonical fallback order; the *active* order
/// (which drives fan-out) comes from [`parse_brand_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Dm,
    Rossmann,
    Mueller,
    Budni,
}

impl Brand {
    pub const ALL: [Brand; 4] = [Brand::Dm, Brand::Rossmann, Brand::Mueller, Brand::Budni];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Brand::Dm => "dm",
            Brand::Rossmann => "rossmann",
            Brand::Mueller => "mueller",
            Brand::Budni => "budni",
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Brand {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dm" => Ok(Brand::Dm),
            "rossmann" => Ok(Brand::Rossmann),
            "mueller" => Ok(Brand::Mueller),
            "budni" => Ok(Brand::Budni),
            other => Err(ConfigError::Validation(format!("unknown brand: '{other}'"))),
        }
    }
}

/// Parse a comma-separated brand list into an ordered, duplicate-free set.
///
/// The order of the input is preserved; it determines fan-out order and
/// image-selection precedence.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] on an unknown brand name, a
/// duplicate entry, or an empty list.
pub fn parse_brand_list(raw: &str) -> Result<Vec<Brand>, ConfigError> {
    let mut brands = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let brand: Brand = part.parse()?;
        if brands.contains(&brand) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand in list: '{brand}'"
            )));
        }
        brands.push(brand);
    }

    if brands.is_empty() {
        return Err(ConfigError::Validation(
            "brand list must name at least one brand".to_string(),
        ));
    }

    Ok(brands)
}
