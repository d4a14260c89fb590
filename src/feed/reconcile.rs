use super::sort::resort_in_place;
use crate::core::UserId;
use crate::model::{ActivityRecord, ContactBook, EnrichedActivity};
use crate::realtime::RowChange;

/// Join an activity row with the owner's contact entry.
///
/// A non-empty contact display name wins over the row's own name. The email
/// comes from the contact only.
pub fn enrich(record: &ActivityRecord, contacts: &ContactBook) -> EnrichedActivity {
    let contact = contacts.get(&record.user_id);
    let display_name = contact
        .and_then(|c| c.display_name_override())
        .unwrap_or(record.display_name.as_str())
        .to_string();
    let email = contact.and_then(|c| c.email_override()).map(str::to_string);

    EnrichedActivity {
        user_id: record.user_id.clone(),
        display_name,
        email,
        last_checkin: record.last_checkin,
        priority: record.priority,
    }
}

/// Outcome of applying one change to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Removed,
    Unchanged,
}

/// Sorted in-memory view, at most one entry per user id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityList {
    entries: Vec<EnrichedActivity>,
}

impl ActivityList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot; a user id seen twice keeps its later row
    pub fn from_snapshot(records: &[ActivityRecord], contacts: &ContactBook) -> Self {
        let mut list = Self::new();
        for record in records {
            list.put(enrich(record, contacts));
        }
        resort_in_place(&mut list.entries);
        list
    }

    pub fn entries(&self) -> &[EnrichedActivity] {
        &self.entries
    }

    pub fn get(&self, user_id: &UserId) -> Option<&EnrichedActivity> {
        self.entries.iter().find(|e| &e.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply one validated change event.
    ///
    /// Inserts and updates are both upserts. Deleting an unknown id leaves
    /// the list untouched.
    pub fn apply(&mut self, change: RowChange<ActivityRecord>, contacts: &ContactBook) -> Applied {
        match change {
            RowChange::Insert { row } | RowChange::Update { row } => {
                self.upsert(enrich(&row, contacts))
            }
            RowChange::Delete { prior_key } => {
                if self.remove(&prior_key) {
                    Applied::Removed
                } else {
                    Applied::Unchanged
                }
            }
        }
    }

    /// Replace the entry with the same user id in place, or append; then re-sort
    pub fn upsert(&mut self, entry: EnrichedActivity) -> Applied {
        let applied = self.put(entry);
        resort_in_place(&mut self.entries);
        applied
    }

    pub fn remove(&mut self, user_id: &UserId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.user_id != user_id);
        self.entries.len() != before
    }

    fn put(&mut self, entry: EnrichedActivity) -> Applied {
        match self.entries.iter_mut().find(|e| e.user_id == entry.user_id) {
            Some(existing) => {
                *existing = entry;
                Applied::Replaced
            }
            None => {
                self.entries.push(entry);
                Applied::Inserted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Priority;
    use crate::feed::sort::is_sorted;
    use crate::model::ContactEntry;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, priority: Priority, hour: Option<u32>) -> ActivityRecord {
        let mut record = ActivityRecord::new(id, &format!("raw-{id}"), priority);
        record.last_checkin = hour.map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap());
        record
    }

    fn ids(list: &ActivityList) -> Vec<&str> {
        list.entries().iter().map(|e| e.user_id.as_str()).collect()
    }

    #[test]
    fn test_enrich_prefers_contact_fields() {
        let contacts = ContactBook::from_entries(vec![
            ContactEntry::new("A").display_name("Alice").email("a@x.com"),
        ]);
        let mut raw = ActivityRecord::new("A", "fallback", Priority::Normal);
        raw.last_checkin = None;

        let enriched = enrich(&raw, &contacts);
        assert_eq!(enriched.display_name, "Alice");
        assert_eq!(enriched.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_enrich_without_contact_match() {
        let enriched = enrich(
            &ActivityRecord::new("Z", "Zed", Priority::Warning),
            &ContactBook::new(),
        );
        assert_eq!(enriched.display_name, "Zed");
        assert_eq!(enriched.email, None);
        assert_eq!(enriched.priority, Priority::Warning);
    }

    #[test]
    fn test_enrich_ignores_empty_overrides() {
        let contacts =
            ContactBook::from_entries(vec![ContactEntry::new("A").display_name("").email("")]);
        let enriched = enrich(&ActivityRecord::new("A", "raw", Priority::Normal), &contacts);
        assert_eq!(enriched.display_name, "raw");
        assert_eq!(enriched.email, None);
    }

    #[test]
    fn test_snapshot_dedupes_and_sorts() {
        let list = ActivityList::from_snapshot(
            &[
                record("A", Priority::Warning, Some(10)),
                record("B", Priority::Critical, None),
                record("A", Priority::Normal, Some(11)),
            ],
            &ContactBook::new(),
        );
        assert_eq!(ids(&list), vec!["B", "A"]);
        assert_eq!(list.get(&"A".into()).unwrap().priority, Priority::Normal);
    }

    #[test]
    fn test_insert_then_update_keeps_one_entry() {
        let contacts = ContactBook::new();
        let mut list = ActivityList::new();

        let inserted = list.apply(
            RowChange::Insert {
                row: record("A", Priority::Normal, Some(9)),
            },
            &contacts,
        );
        let updated = list.apply(
            RowChange::Update {
                row: record("A", Priority::Critical, Some(12)),
            },
            &contacts,
        );

        assert_eq!(inserted, Applied::Inserted);
        assert_eq!(updated, Applied::Replaced);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(&"A".into()).unwrap().priority, Priority::Critical);
    }

    #[test]
    fn test_delete_present_and_absent() {
        let contacts = ContactBook::new();
        let mut list = ActivityList::from_snapshot(
            &[
                record("A", Priority::Critical, None),
                record("B", Priority::Normal, None),
            ],
            &contacts,
        );

        let before = list.clone();
        let missing = list.apply(RowChange::Delete { prior_key: "Q".into() }, &contacts);
        assert_eq!(missing, Applied::Unchanged);
        assert_eq!(list, before);

        let removed = list.apply(RowChange::Delete { prior_key: "A".into() }, &contacts);
        assert_eq!(removed, Applied::Removed);
        assert_eq!(ids(&list), vec!["B"]);
    }

    #[test]
    fn test_upsert_resorts() {
        let contacts = ContactBook::new();
        let mut list = ActivityList::from_snapshot(
            &[
                record("A", Priority::Warning, Some(8)),
                record("B", Priority::Normal, Some(9)),
            ],
            &contacts,
        );
        list.apply(
            RowChange::Update {
                row: record("B", Priority::Critical, Some(9)),
            },
            &contacts,
        );
        assert_eq!(ids(&list), vec!["B", "A"]);
        assert!(is_sorted(list.entries()));
    }
}
