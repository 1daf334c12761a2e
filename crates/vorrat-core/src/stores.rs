use serde::{Deserialize, Serialize};

/// One open/close interval within a day, times as the storefront renders
/// them (e.g. `"09:00"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInterval {
    pub open: String,
    pub close: String,
}

/// Unified 7-day opening-hours table. Every storefront's native format
/// (weekday numbers, abbreviated German day names, range rules) is
/// normalized into this shape before storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    #[serde(rename = "Monday", default)]
    pub monday: Vec<OpenInterval>,
    #[serde(rename = "Tuesday", default)]
    pub tuesday: Vec<OpenInterval>,
    #[serde(rename = "Wednesday", default)]
    pub wednesday: Vec<OpenInterval>,
    #[serde(rename = "Thursday", default)]
    pub thursday: Vec<OpenInterval>,
    #[serde(rename = "Friday", default)]
    pub friday: Vec<OpenInterval>,
    #[serde(rename = "Saturday", default)]
    pub saturday: Vec<OpenInterval>,
    #[serde(rename = "Sunday", default)]
    pub sunday: Vec<OpenInterval>,
}

impl OpeningHours {
    /// Mutable access by day index, Monday = 0 … Sunday = 6.
    pub fn day_mut(&mut self, index: usize) -> Option<&mut Vec<OpenInterval>> {
        match index {
            0 => Some(&mut self.monday),
            1 => Some(&mut self.tuesday),
            2 => Some(&mut self.wednesday),
            3 => Some(&mut self.thursday),
            4 => Some(&mut self.friday),
            5 => Some(&mut self.saturday),
            6 => Some(&mut self.sunday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreAddress {
    pub name: Option<String>,
    pub street: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
}

/// Core identity and contact data of one physical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(rename = "storeId")]
    pub store_id: String,
    #[serde(rename = "storeNumber")]
    pub store_number: String,
    pub address: StoreAddress,
    pub phone: Option<String>,
    /// `[latitude, longitude]`.
    pub coordinates: [f64; 2],
}

/// A store as returned by directory searches and the saved-stores API:
/// identity plus normalized opening hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreListing {
    pub data: StoreData,
    #[serde(rename = "openingHours")]
    pub opening_hours: OpeningHours,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_hours_serialize_with_capitalized_day_keys() {
        let mut hours = OpeningHours::default();
        hours.monday.push(OpenInterval {
            open: "09:00".to_string(),
            close: "19:00".to_string(),
        });
        let json = serde_json::to_value(&hours).unwrap();
        assert_eq!(json["Monday"][0]["open"], "09:00");
        assert!(json["Sunday"].as_array().unwrap().is_empty());
    }

    #[test]
    fn day_mut_indexes_monday_through_sunday() {
        let mut hours = OpeningHours::default();
        for day in 0..7 {
            assert!(hours.day_mut(day).is_some());
        }
        assert!(hours.day_mut(7).is_none());
    }

    #[test]
    fn store_listing_round_trips() {
        let listing = StoreListing {
            data: StoreData {
                store_id: "2711".to_string(),
                store_number: "2711".to_string(),
                address: StoreAddress {
                    name: Some("dm-drogerie markt".to_string()),
                    street: Some("Schlossstr. 1".to_string()),
                    zip: Some("12163".to_string()),
                    city: Some("Berlin".to_string()),
                    region_name: None,
                },
                phone: None,
                coordinates: [52.456, 13.319],
            },
            opening_hours: OpeningHours::default(),
        };
        let json = serde_json::to_string(&listing).unwrap();
        let decoded: StoreListing = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, listing);
    }
}
