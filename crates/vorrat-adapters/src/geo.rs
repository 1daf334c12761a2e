//! Geocoding helpers shared by the store directory searches.

use crate::error::AdapterError;
use crate::http::fetch_json;

/// `true` for inputs that look like a German postal code.
#[must_use]
pub fn is_zip_code(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.len() == 5 && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Resolve a ZIP code or place name to `(lat, lon)` via Nominatim.
///
/// # Errors
///
/// Returns [`AdapterError`] when the service is unreachable or knows no
/// such place.
pub async fn get_coordinates(
    client: &reqwest::Client,
    base_url: &str,
    query: &str,
) -> Result<(f64, f64), AdapterError> {
    let url = format!(
        "{base_url}/search?format=json&limit=1&q={}",
        urlencode(query.trim())
    );
    let data = fetch_json(client, &url, &[]).await?;

    let first = data
        .as_array()
        .and_then(|results| results.first())
        .ok_or_else(|| AdapterError::Parse {
            context: format!("no geocoding result for '{query}'"),
        })?;

    let lat = json_coord(first, "lat");
    let lon = json_coord(first, "lon");
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(AdapterError::Parse {
            context: format!("geocoding result for '{query}' lacks coordinates"),
        }),
    }
}

/// Check a German postal code against the zippopotam.us registry.
///
/// # Errors
///
/// Returns [`AdapterError::Network`] when the registry is unreachable.
pub async fn is_valid_plz(
    client: &reqwest::Client,
    base_url: &str,
    plz: &str,
) -> Result<bool, AdapterError> {
    let response = client.get(format!("{base_url}/de/{plz}")).send().await?;
    Ok(response.status().is_success())
}

/// Great-circle distance in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn json_coord(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

pub(crate) fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_code_detection() {
        assert!(is_zip_code("20095"));
        assert!(is_zip_code(" 10115 "));
        assert!(!is_zip_code("2009"));
        assert!(!is_zip_code("berlin"));
        assert!(!is_zip_code("200956"));
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        assert!(haversine_km(53.55, 9.99, 53.55, 9.99).abs() < 1e-9);
    }

    #[test]
    fn haversine_hamburg_to_berlin_is_plausible() {
        // Roughly 255 km as the crow flies.
        let km = haversine_km(53.5511, 9.9937, 52.5200, 13.4050);
        assert!((230.0..280.0).contains(&km), "got {km}");
    }

    #[test]
    fn urlencode_keeps_unreserved_and_escapes_umlauts() {
        assert_eq!(urlencode("balea shampoo"), "balea%20shampoo");
        assert_eq!(urlencode("köln"), "k%C3%B6ln");
        assert_eq!(urlencode("a-b_c.d~e"), "a-b_c.d~e");
    }
}
