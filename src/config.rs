use anyhow::{Context, Result};

/// Names and limits the activity feed uses when talking to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Latest-check-in-per-user view
    pub activity_table: String,

    /// Owner -> contact relationship table
    pub contacts_table: String,

    /// Change channel for the activity view
    pub activity_channel: String,

    /// Change channel for the owner's contact list
    pub contacts_channel: String,

    /// Key column shared by activity rows and contact rows
    pub key_column: String,

    /// Column holding the id of the contact's owner
    pub owner_column: String,

    /// Column holding the contact's user id
    pub contact_column: String,

    /// Contacts are read in ascending order of this column
    pub contacts_order_column: String,

    /// Maximum number of contacts read per owner, and kept when saving
    pub contact_limit: usize,

    /// Append-only check-in log, keyed by `key_column`
    pub checkins_table: String,

    /// Check-ins are stamped and ordered by this column
    pub checkin_time_column: String,

    /// Registered users; contacts must exist here
    pub profiles_table: String,

    /// Id column of the profiles table
    pub profile_key_column: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            activity_table: "user_latest_checkins".to_string(),
            contacts_table: "contacts".to_string(),
            activity_channel: "latest-checkins-realtime".to_string(),
            contacts_channel: "contacts-realtime".to_string(),
            key_column: "user_id".to_string(),
            owner_column: "owner_user_id".to_string(),
            contact_column: "contact_user_id".to_string(),
            contacts_order_column: "created_at".to_string(),
            contact_limit: 3,
            checkins_table: "checkins".to_string(),
            checkin_time_column: "created_at".to_string(),
            profiles_table: "profiles".to_string(),
            profile_key_column: "id".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_table(mut self, table: &str) -> Self {
        self.activity_table = table.to_string();
        self
    }

    pub fn contacts_table(mut self, table: &str) -> Self {
        self.contacts_table = table.to_string();
        self
    }

    pub fn activity_channel(mut self, channel: &str) -> Self {
        self.activity_channel = channel.to_string();
        self
    }

    pub fn contacts_channel(mut self, channel: &str) -> Self {
        self.contacts_channel = channel.to_string();
        self
    }

    pub fn contact_column(mut self, column: &str) -> Self {
        self.contact_column = column.to_string();
        self
    }

    pub fn checkins_table(mut self, table: &str) -> Self {
        self.checkins_table = table.to_string();
        self
    }

    pub fn contact_limit(mut self, limit: usize) -> Self {
        self.contact_limit = limit;
        self
    }

    /// Read `CHECKIN_FEED_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let read = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let contact_limit = match lookup("CHECKIN_FEED_CONTACT_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("CHECKIN_FEED_CONTACT_LIMIT must be a number, got '{raw}'"))?,
            None => defaults.contact_limit,
        };

        Ok(Self {
            activity_table: read("CHECKIN_FEED_ACTIVITY_TABLE", &defaults.activity_table),
            contacts_table: read("CHECKIN_FEED_CONTACTS_TABLE", &defaults.contacts_table),
            activity_channel: read("CHECKIN_FEED_ACTIVITY_CHANNEL", &defaults.activity_channel),
            contacts_channel: read("CHECKIN_FEED_CONTACTS_CHANNEL", &defaults.contacts_channel),
            contact_column: read("CHECKIN_FEED_CONTACT_COLUMN", &defaults.contact_column),
            checkins_table: read("CHECKIN_FEED_CHECKINS_TABLE", &defaults.checkins_table),
            profiles_table: read("CHECKIN_FEED_PROFILES_TABLE", &defaults.profiles_table),
            contact_limit,
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.activity_table, "user_latest_checkins");
        assert_eq!(config.contact_limit, 3);
    }

    #[test]
    fn test_builder() {
        let config = FeedConfig::new().contact_limit(5).activity_table("feed");
        assert_eq!(config.contact_limit, 5);
        assert_eq!(config.activity_table, "feed");
        assert_eq!(config.contacts_table, "contacts");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHECKIN_FEED_CONTACTS_TABLE", "friends"),
            ("CHECKIN_FEED_CONTACT_LIMIT", " 7 "),
            ("CHECKIN_FEED_CONTACT_COLUMN", "friend_id"),
            ("CHECKIN_FEED_CHECKINS_TABLE", "daily_checkins"),
        ]);
        let config = FeedConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.contacts_table, "friends");
        assert_eq!(config.contact_limit, 7);
        assert_eq!(config.activity_channel, "latest-checkins-realtime");
        assert_eq!(config.contact_column, "friend_id");
        assert_eq!(config.checkins_table, "daily_checkins");
        assert_eq!(config.profiles_table, "profiles");
    }

    #[test]
    fn test_from_lookup_rejects_bad_limit() {
        let result = FeedConfig::from_lookup(|k| {
            (k == "CHECKIN_FEED_CONTACT_LIMIT").then(|| "three".to_string())
        });
        assert!(result.is_err());
    }
}
