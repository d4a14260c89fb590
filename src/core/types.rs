use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A backend row as delivered by queries and change payloads
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Opaque user identifier issued by the backing store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key cell as sent by the store: a non-empty string or a number
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Urgency tier derived by the backing store from check-in recency
///
/// Ordering follows urgency: `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Warning => "warning",
            Priority::Critical => "critical",
        }
    }
}

impl TryFrom<i64> for Priority {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::Normal),
            1 => Ok(Priority::Warning),
            2 => Ok(Priority::Critical),
            other => Err(format!("priority {other} is outside 0..=2")),
        }
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority as i64
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_from_integer() {
        let p: Priority = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(p, Priority::Critical);
        assert!(serde_json::from_value::<Priority>(json!(3)).is_err());
        assert!(serde_json::from_value::<Priority>(json!(-1)).is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::Warning);
        assert!(Priority::Warning > Priority::Normal);
        assert_eq!(serde_json::to_value(Priority::Warning).unwrap(), json!(1));
    }

    #[test]
    fn test_user_id_is_transparent() {
        let id: UserId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(id, UserId::from("abc"));
        assert_eq!(id.to_string(), "abc");
        assert_ne!(UserId::generate(), UserId::generate());
    }

    #[test]
    fn test_user_id_from_cell() {
        assert_eq!(UserId::from_value(&json!("a")), Some(UserId::from("a")));
        assert_eq!(UserId::from_value(&json!(42)), Some(UserId::from("42")));
        assert_eq!(UserId::from_value(&json!("")), None);
        assert_eq!(UserId::from_value(&json!(null)), None);
    }
}
