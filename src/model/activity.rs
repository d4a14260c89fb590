use crate::core::{FeedError, Priority, Result, Row, UserId, lenient_timestamp};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Latest check-in state for one user, as published by the latest-per-user view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: UserId,
    #[serde(default, deserialize_with = "string_or_null")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_checkin: Option<DateTime<Utc>>,
    pub priority: Priority,
}

impl ActivityRecord {
    pub fn new(user_id: impl Into<UserId>, display_name: &str, priority: Priority) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.to_string(),
            last_checkin: None,
            priority,
        }
    }

    pub fn checked_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_checkin = Some(at);
        self
    }

    /// Decode a backend row, rejecting rows without a usable key or priority.
    /// An unreadable `last_checkin` is kept as "no check-in" rather than
    /// dropping the row.
    pub fn from_row(row: &Row) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(row.clone()))
            .map_err(|e| FeedError::malformed(format!("activity row: {e}")))
    }

    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Row::new(),
        }
    }
}

/// Activity row joined with the owner's contact entry for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedActivity {
    pub user_id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub last_checkin: Option<DateTime<Utc>>,
    pub priority: Priority,
}

impl EnrichedActivity {
    pub fn status_line(&self) -> String {
        self.status_line_in(&Local)
    }

    pub fn status_line_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match self.last_checkin {
            None => "no activity yet".to_string(),
            Some(at) => format!(
                "last confirmed {}",
                at.with_timezone(tz).format("%b %d %H:%M")
            ),
        }
    }
}

fn string_or_null<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_row_accepts_null_checkin() {
        let record = ActivityRecord::from_row(&row(json!({
            "user_id": "B",
            "display_name": "Bob",
            "last_checkin": null,
            "priority": 2
        })))
        .unwrap();

        assert_eq!(record.user_id, UserId::from("B"));
        assert_eq!(record.last_checkin, None);
        assert_eq!(record.priority, Priority::Critical);
    }

    #[test]
    fn test_from_row_tolerates_null_display_name() {
        let record = ActivityRecord::from_row(&row(json!({
            "user_id": "A",
            "display_name": null,
            "priority": 0
        })))
        .unwrap();
        assert_eq!(record.display_name, "");
    }

    #[test]
    fn test_from_row_rejects_missing_key() {
        let err = ActivityRecord::from_row(&row(json!({ "priority": 1 }))).unwrap_err();
        assert!(matches!(err, FeedError::MalformedPayload(_)));
    }

    #[test]
    fn test_from_row_parses_offsets() {
        let record = ActivityRecord::from_row(&row(json!({
            "user_id": "A",
            "display_name": "Ann",
            "last_checkin": "2024-01-01T12:00:00+02:00",
            "priority": 1
        })))
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(record.last_checkin, Some(expected));
    }

    #[test]
    fn test_from_row_reads_store_timestamp_forms() {
        let decode = |raw: &str| {
            ActivityRecord::from_row(&row(json!({
                "user_id": "A",
                "display_name": "Ann",
                "last_checkin": raw,
                "priority": 0
            })))
            .unwrap()
            .last_checkin
        };
        let ten = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        assert_eq!(decode("2024-01-01 10:00:00+00"), Some(ten));
        assert_eq!(decode("2024-01-01T10:00:00"), Some(ten));
        let micros = decode("2024-01-01T10:00:00.123456").unwrap();
        assert_eq!(micros.timestamp(), ten.timestamp());
    }

    #[test]
    fn test_unreadable_checkin_keeps_the_row() {
        let record = ActivityRecord::from_row(&row(json!({
            "user_id": "A",
            "display_name": "Ann",
            "last_checkin": "not a time",
            "priority": 1
        })))
        .unwrap();
        assert_eq!(record.user_id, UserId::from("A"));
        assert_eq!(record.last_checkin, None);
        assert_eq!(record.priority, Priority::Warning);
    }

    #[test]
    fn test_status_line() {
        let mut entry = EnrichedActivity {
            user_id: "A".into(),
            display_name: "Ann".into(),
            email: None,
            last_checkin: None,
            priority: Priority::Normal,
        };
        assert_eq!(entry.status_line_in(&Utc), "no activity yet");

        entry.last_checkin = Some(Utc.with_ymd_and_hms(2024, 3, 7, 8, 5, 0).unwrap());
        assert_eq!(entry.status_line_in(&Utc), "last confirmed Mar 07 08:05");
    }
}
