use crate::backend::{QueryBackend, RowFilter, Select, TableWriter};
use crate::config::FeedConfig;
use crate::core::{FeedError, Result, UserId};
use crate::model::{ContactBook, ContactEntry};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{Instrument, Level, event, info_span};

/// Replace `owner`'s contact list with `contacts`.
///
/// Repeated ids keep their first entry and only the first `contact_limit`
/// entries are stored, in the given order. Every stored id must exist in the
/// profiles table; otherwise nothing is changed and `UnknownUser` is returned.
pub async fn replace_contacts<B>(
    backend: &B,
    config: &FeedConfig,
    owner: &UserId,
    contacts: &[ContactEntry],
) -> Result<ContactBook>
where
    B: QueryBackend + TableWriter + ?Sized,
{
    let span = info_span!("contacts.replace", owner = %owner);
    async {
        let deduped = ContactBook::from_entries(contacts.iter().cloned());
        if deduped.len() > config.contact_limit {
            event!(
                Level::DEBUG,
                requested = deduped.len(),
                limit = config.contact_limit,
                "dropping contacts over the limit"
            );
        }
        let kept: Vec<ContactEntry> = deduped
            .ids()
            .iter()
            .take(config.contact_limit)
            .filter_map(|id| deduped.get(id).cloned())
            .collect();

        ensure_registered(backend, config, &kept).await?;

        let owner_filter = RowFilter::equals(&config.owner_column, owner.as_str());
        let removed = backend
            .delete_rows(&config.contacts_table, &owner_filter)
            .await?;

        // Spread creation times so reads ordered by them keep the given order.
        let base = Utc::now();
        for (position, entry) in kept.iter().enumerate() {
            let mut row = entry.to_row(&config.contact_column);
            row.insert(config.owner_column.clone(), Value::from(owner.as_str()));
            let created_at = base + Duration::milliseconds(position as i64);
            row.insert(
                config.contacts_order_column.clone(),
                Value::from(created_at.to_rfc3339()),
            );
            backend.insert_row(&config.contacts_table, row).await?;
        }

        event!(Level::INFO, removed, stored = kept.len(), "contacts replaced");
        Ok(ContactBook::from_entries(kept))
    }
    .instrument(span)
    .await
}

async fn ensure_registered<B>(backend: &B, config: &FeedConfig, entries: &[ContactEntry]) -> Result<()>
where
    B: QueryBackend + ?Sized,
{
    if entries.is_empty() {
        return Ok(());
    }

    let ids: Vec<UserId> = entries.iter().map(|e| e.contact_user_id.clone()).collect();
    let query = Select::from_table(&config.profiles_table)
        .filter(RowFilter::user_ids(&config.profile_key_column, &ids));
    let found: HashSet<UserId> = backend
        .select(&query)
        .await?
        .iter()
        .filter_map(|row| row.get(&config.profile_key_column).and_then(UserId::from_value))
        .collect();

    match ids.into_iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(FeedError::UnknownUser(missing.to_string())),
        None => Ok(()),
    }
}
