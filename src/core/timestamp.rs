use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{Level, event};

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp cell from the store.
///
/// Accepts RFC 3339, the `timestamptz` text form (`2024-01-01 10:00:00+00`)
/// and offset-less values, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = raw.parse::<DateTime<Utc>>() {
        return Some(at);
    }
    for format in OFFSET_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Some(at.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Serde adapter for optional timestamp cells; anything unreadable becomes `None`
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match cell {
        Some(serde_json::Value::String(raw)) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                event!(Level::DEBUG, value = %raw, "unreadable timestamp treated as missing");
            }
            parsed
        }
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            event!(Level::DEBUG, value = %other, "non-string timestamp treated as missing");
            None
        }
    })
}
