use crate::core::{FeedError, Result, Row, UserId};
use serde_json::Value;
use std::collections::HashMap;

const EMAIL_COLUMN: &str = "contact_email";
const DISPLAY_NAME_COLUMN: &str = "contact_display_name";

/// One entry of an owner's contact list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub contact_user_id: UserId,
    pub contact_email: Option<String>,
    pub contact_display_name: Option<String>,
}

impl ContactEntry {
    pub fn new(contact_user_id: impl Into<UserId>) -> Self {
        Self {
            contact_user_id: contact_user_id.into(),
            contact_email: None,
            contact_display_name: None,
        }
    }

    pub fn email(mut self, email: &str) -> Self {
        self.contact_email = Some(email.to_string());
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.contact_display_name = Some(name.to_string());
        self
    }

    /// Decode a contacts row whose contact id is stored in `id_column`
    pub fn from_row(row: &Row, id_column: &str) -> Result<Self> {
        let contact_user_id = row
            .get(id_column)
            .and_then(UserId::from_value)
            .ok_or_else(|| FeedError::malformed(format!("contact row without '{id_column}'")))?;

        Ok(Self {
            contact_user_id,
            contact_email: text_cell(row, EMAIL_COLUMN),
            contact_display_name: text_cell(row, DISPLAY_NAME_COLUMN),
        })
    }

    /// Contact columns of a contacts row; the caller adds owner and ordering
    pub fn to_row(&self, id_column: &str) -> Row {
        let mut row = Row::new();
        row.insert(id_column.to_string(), Value::from(self.contact_user_id.as_str()));
        if let Some(email) = &self.contact_email {
            row.insert(EMAIL_COLUMN.to_string(), Value::from(email.as_str()));
        }
        if let Some(name) = &self.contact_display_name {
            row.insert(DISPLAY_NAME_COLUMN.to_string(), Value::from(name.as_str()));
        }
        row
    }

    /// Display name override, ignoring empty strings
    pub fn display_name_override(&self) -> Option<&str> {
        non_empty(self.contact_display_name.as_deref())
    }

    /// Email override, ignoring empty strings
    pub fn email_override(&self) -> Option<&str> {
        non_empty(self.contact_email.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn text_cell(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_string)
}

/// The owner's contact set: ids in backing-store order plus a lookup map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBook {
    ids: Vec<UserId>,
    map: HashMap<UserId, ContactEntry>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; a repeated contact id keeps its first entry
    pub fn from_entries(entries: impl IntoIterator<Item = ContactEntry>) -> Self {
        let mut book = Self::new();
        for entry in entries {
            if book.map.contains_key(&entry.contact_user_id) {
                continue;
            }
            book.ids.push(entry.contact_user_id.clone());
            book.map.insert(entry.contact_user_id.clone(), entry);
        }
        book
    }

    pub fn ids(&self) -> &[UserId] {
        &self.ids
    }

    pub fn get(&self, id: &UserId) -> Option<&ContactEntry> {
        self.map.get(id)
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_row_uses_configured_id_column() {
        let entry = ContactEntry::from_row(
            &row(json!({ "friend_id": "F", "contact_email": "f@x.com", "contact_display_name": null })),
            "friend_id",
        )
        .unwrap();
        assert_eq!(entry.contact_user_id, UserId::from("F"));
        assert_eq!(entry.email_override(), Some("f@x.com"));
        assert_eq!(entry.display_name_override(), None);

        let err = ContactEntry::from_row(&row(json!({ "contact_user_id": "F" })), "friend_id");
        assert!(matches!(err, Err(FeedError::MalformedPayload(_))));
    }

    #[test]
    fn test_to_row_round_trips_through_the_same_column() {
        let entry = ContactEntry::new("F").display_name("Fay");
        let decoded = ContactEntry::from_row(&entry.to_row("friend_id"), "friend_id").unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_book_keeps_order_and_first_entry() {
        let book = ContactBook::from_entries(vec![
            ContactEntry::new("B").display_name("Bob"),
            ContactEntry::new("A"),
            ContactEntry::new("B").display_name("Other Bob"),
        ]);

        assert_eq!(book.ids(), &[UserId::from("B"), UserId::from("A")]);
        assert_eq!(book.len(), 2);
        assert_eq!(
            book.get(&"B".into()).and_then(|c| c.display_name_override()),
            Some("Bob")
        );
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let entry = ContactEntry::new("A").email("").display_name("");
        assert_eq!(entry.email_override(), None);
        assert_eq!(entry.display_name_override(), None);
    }
}
