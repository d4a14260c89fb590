// ============================================================================
// Change Events
// ============================================================================
//
// The change stream delivers loosely-shaped payloads ({eventType, new, old}).
// They are validated here into a tagged `RowChange` before any reconciliation
// logic sees them, so downstream code never inspects raw payloads.
//
// ============================================================================

use crate::core::{FeedError, Result, Row, UserId, lenient_timestamp};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Row-level change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// Event-type filter for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(EventKind),
}

impl EventFilter {
    pub fn accepts(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(only) => *only == kind,
        }
    }
}

/// Raw change payload as delivered by the change stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    pub table: String,
    #[serde(rename = "eventType")]
    pub event_type: EventKind,
    #[serde(default)]
    pub new: Option<Row>,
    #[serde(default)]
    pub old: Option<Row>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangePayload {
    pub fn insert(table: &str, row: Row) -> Self {
        Self::build(table, EventKind::Insert, Some(row), None)
    }

    pub fn update(table: &str, new: Row, old: Option<Row>) -> Self {
        Self::build(table, EventKind::Update, Some(new), old)
    }

    pub fn delete(table: &str, old: Row) -> Self {
        Self::build(table, EventKind::Delete, None, Some(old))
    }

    fn build(table: &str, event_type: EventKind, new: Option<Row>, old: Option<Row>) -> Self {
        Self {
            table: table.to_string(),
            event_type,
            new,
            old,
            commit_timestamp: Some(Utc::now()),
        }
    }

    /// `new` image, treating an empty object the same as an absent one
    pub fn new_row(&self) -> Option<&Row> {
        self.new.as_ref().filter(|row| !row.is_empty())
    }

    /// `old` image, treating an empty object the same as an absent one
    pub fn old_row(&self) -> Option<&Row> {
        self.old.as_ref().filter(|row| !row.is_empty())
    }
}

/// Validated change for one keyed row
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<T> {
    Insert { row: T },
    Update { row: T },
    Delete { prior_key: UserId },
}

impl<T: DeserializeOwned> RowChange<T> {
    /// Validate a raw payload.
    ///
    /// Inserts and updates need a decodable `new` image; deletes need the
    /// key column in the `old` image. Anything else is `MalformedPayload`.
    pub fn validate(payload: &ChangePayload, key_column: &str) -> Result<Self> {
        match payload.event_type {
            EventKind::Delete => {
                let prior_key = payload
                    .old_row()
                    .and_then(|old| old.get(key_column))
                    .and_then(UserId::from_value)
                    .ok_or_else(|| {
                        FeedError::malformed(format!(
                            "delete on '{}' without '{}' in old row",
                            payload.table, key_column
                        ))
                    })?;
                Ok(RowChange::Delete { prior_key })
            }
            kind => {
                let new = payload.new_row().ok_or_else(|| {
                    FeedError::malformed(format!(
                        "{:?} on '{}' without new row",
                        kind, payload.table
                    ))
                })?;
                let row: T = serde_json::from_value(serde_json::Value::Object(new.clone()))
                    .map_err(|e| FeedError::malformed(format!("{} row: {e}", payload.table)))?;
                Ok(if kind == EventKind::Insert {
                    RowChange::Insert { row }
                } else {
                    RowChange::Update { row }
                })
            }
        }
    }
}

impl<T> RowChange<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            RowChange::Insert { .. } => EventKind::Insert,
            RowChange::Update { .. } => EventKind::Update,
            RowChange::Delete { .. } => EventKind::Delete,
        }
    }
}
