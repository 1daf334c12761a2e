//! Opening-hours normalization: each storefront reports hours in its own
//! shape; everything converges on the unified 7-day table.

use serde_json::Value;

use vorrat_core::{OpenInterval, OpeningHours};

const ABBREV_DAYS: [(&str, usize); 7] = [
    ("Mo", 0),
    ("Di", 1),
    ("Mi", 2),
    ("Do", 3),
    ("Fr", 4),
    ("Sa", 5),
    ("So", 6),
];

const LOWERCASE_DAYS: [(&str, usize); 7] = [
    ("monday", 0),
    ("tuesday", 1),
    ("wednesday", 2),
    ("thursday", 3),
    ("friday", 4),
    ("saturday", 5),
    ("sunday", 6),
];

fn day_index_abbrev(abbrev: &str) -> Option<usize> {
    ABBREV_DAYS
        .iter()
        .find(|(name, _)| *name == abbrev)
        .map(|(_, index)| *index)
}

fn push_interval(hours: &mut OpeningHours, day: usize, open: &str, close: &str) {
    if let Some(slot) = hours.day_mut(day) {
        slot.push(OpenInterval {
            open: open.to_string(),
            close: close.to_string(),
        });
    }
}

/// dm: `[{weekDay: 1..7, timeRanges: [{opening, closing}]}]`.
#[must_use]
pub fn from_weekday_numbers(data: &Value) -> OpeningHours {
    let mut hours = OpeningHours::default();
    let Some(entries) = data.as_array() else {
        return hours;
    };

    for entry in entries {
        let Some(week_day) = entry.get("weekDay").and_then(Value::as_u64) else {
            continue;
        };
        let Some(day) = (week_day as usize).checked_sub(1) else {
            continue;
        };
        let Some(ranges) = entry.get("timeRanges").and_then(Value::as_array) else {
            continue;
        };
        for range in ranges {
            if let (Some(open), Some(close)) = (
                range.get("opening").and_then(Value::as_str),
                range.get("closing").and_then(Value::as_str),
            ) {
                push_interval(&mut hours, day, open, close);
            }
        }
    }

    hours
}

/// Rossmann: `{Mo: [{openTime, closeTime}], Di: …}`.
#[must_use]
pub fn from_abbreviated_days(data: &Value) -> OpeningHours {
    let mut hours = OpeningHours::default();
    let Some(map) = data.as_object() else {
        return hours;
    };

    for (key, ranges) in map {
        let Some(day) = day_index_abbrev(key) else {
            continue;
        };
        let Some(ranges) = ranges.as_array() else {
            continue;
        };
        for range in ranges {
            if let (Some(open), Some(close)) = (
                range.get("openTime").and_then(Value::as_str),
                range.get("closeTime").and_then(Value::as_str),
            ) {
                push_interval(&mut hours, day, open, close);
            }
        }
    }

    hours
}

/// Müller: `[{day: "monday", openingTime, closingTime}]`.
#[must_use]
pub fn from_lowercase_days(data: &Value) -> OpeningHours {
    let mut hours = OpeningHours::default();
    let Some(entries) = data.as_array() else {
        return hours;
    };

    for entry in entries {
        let day = entry
            .get("day")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .and_then(|name| {
                LOWERCASE_DAYS
                    .iter()
                    .find(|(candidate, _)| *candidate == name)
                    .map(|(_, index)| *index)
            });
        let Some(day) = day else { continue };

        if let (Some(open), Some(close)) = (
            entry.get("openingTime").and_then(Value::as_str),
            entry.get("closingTime").and_then(Value::as_str),
        ) {
            push_interval(&mut hours, day, open, close);
        }
    }

    hours
}

/// Budni: a summary string of range rules like
/// `"Mo-Fr: 9:00-19:00, Sa: 9:00-18:00"`.
#[must_use]
pub fn from_working_days_summary(summary: &str) -> OpeningHours {
    let mut hours = OpeningHours::default();

    for rule in summary.split(',') {
        let Some((days_part, hours_part)) = rule.split_once(": ") else {
            continue;
        };
        let days_part = days_part.trim();
        let Some((open, close)) = hours_part.trim().split_once('-') else {
            continue;
        };
        let (open, close) = (open.trim(), close.trim());

        if let Some((start, end)) = days_part.split_once('-') {
            let (Some(start), Some(end)) =
                (day_index_abbrev(start.trim()), day_index_abbrev(end.trim()))
            else {
                continue;
            };
            if start <= end {
                for day in start..=end {
                    push_interval(&mut hours, day, open, close);
                }
            }
        } else if let Some(day) = day_index_abbrev(days_part) {
            push_interval(&mut hours, day, open, close);
        }
    }

    hours
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn weekday_numbers_map_one_to_monday() {
        let data = json!([
            {"weekDay": 1, "timeRanges": [{"opening": "08:00", "closing": "20:00"}]},
            {"weekDay": 7, "timeRanges": [{"opening": "10:00", "closing": "16:00"}]},
        ]);
        let hours = from_weekday_numbers(&data);
        assert_eq!(hours.monday[0].open, "08:00");
        assert_eq!(hours.sunday[0].close, "16:00");
        assert!(hours.tuesday.is_empty());
    }

    #[test]
    fn abbreviated_days_map_german_keys() {
        let data = json!({
            "Mo": [{"openTime": "09:00", "closeTime": "19:00"}],
            "Sa": [{"openTime": "09:00", "closeTime": "18:00"}],
        });
        let hours = from_abbreviated_days(&data);
        assert_eq!(hours.monday[0].close, "19:00");
        assert_eq!(hours.saturday[0].close, "18:00");
        assert!(hours.sunday.is_empty());
    }

    #[test]
    fn lowercase_days_skip_entries_without_times() {
        let data = json!([
            {"day": "monday", "openingTime": "08:30", "closingTime": "20:00"},
            {"day": "sunday", "openingTime": null, "closingTime": null},
        ]);
        let hours = from_lowercase_days(&data);
        assert_eq!(hours.monday.len(), 1);
        assert!(hours.sunday.is_empty());
    }

    #[test]
    fn working_days_summary_expands_ranges() {
        let hours = from_working_days_summary("Mo-Fr: 9:00-19:00, Sa: 9:00-18:00");
        for day in [
            &hours.monday,
            &hours.tuesday,
            &hours.wednesday,
            &hours.thursday,
            &hours.friday,
        ] {
            assert_eq!(day.len(), 1);
            assert_eq!(day[0].open, "9:00");
            assert_eq!(day[0].close, "19:00");
        }
        assert_eq!(hours.saturday[0].close, "18:00");
        assert!(hours.sunday.is_empty());
    }

    #[test]
    fn working_days_summary_ignores_malformed_rules() {
        let hours = from_working_days_summary("Mo-Fr, garbage, So: 10:00-14:00");
        assert!(hours.monday.is_empty());
        assert_eq!(hours.sunday[0].open, "10:00");
    }
}
