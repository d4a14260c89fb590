// ============================================================================
// Activity Feed
// ============================================================================
//
// Owns the enriched activity list for one signed-in owner and keeps it in
// step with two change streams:
//
//   contacts stream (owner_user_id=eq.<owner>)  -> re-fetch contacts,
//                                                  replace activity stream,
//                                                  re-fetch snapshot
//   activity stream (user_id=in.(<contacts>))   -> reconcile one change
//
// Fetch failures degrade the view instead of failing the feed: the list keeps
// its previous contents (or stays empty on first load).
//
// ============================================================================

use super::reconcile::{ActivityList, Applied};
use crate::backend::{Backend, OrderBy, RowFilter, Select};
use crate::config::FeedConfig;
use crate::core::{FeedError, Result, UserId};
use crate::model::{ActivityRecord, ContactBook, ContactEntry, EnrichedActivity};
use crate::realtime::{ChangePayload, RowChange, Subscription, SubscriptionSpec};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Instrument, Level, event, info_span};

/// Shared "is the feed still displayed" flag.
///
/// Fetch results are only applied while the context is active, so a fetch that
/// resolves after teardown cannot mutate the view.
#[derive(Debug, Clone)]
pub struct FeedContext {
    active: Arc<AtomicBool>,
}

impl FeedContext {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for FeedContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Next thing the feed has to react to
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Activity(ChangePayload),
    ContactsChanged(ChangePayload),
    /// Neither stream is open; nothing will arrive until a refresh
    Idle,
}

pub struct ActivityFeed<B: Backend + ?Sized> {
    backend: Arc<B>,
    config: FeedConfig,
    owner: UserId,
    context: FeedContext,
    contacts: ContactBook,
    list: ActivityList,
    activity_sub: Option<Subscription>,
    contacts_sub: Option<Subscription>,
    loading: bool,
}

impl<B: Backend + ?Sized> ActivityFeed<B> {
    /// Resolve the caller, load contacts, open both streams and load the snapshot.
    ///
    /// Only a missing identity is an error; every other failure leaves the
    /// feed open with whatever could be loaded.
    pub async fn open(backend: Arc<B>, config: FeedConfig) -> Result<Self> {
        let owner = backend
            .current_user_id()
            .await?
            .ok_or(FeedError::NotAuthenticated)?;

        let mut feed = Self {
            backend,
            config,
            owner,
            context: FeedContext::new(),
            contacts: ContactBook::new(),
            list: ActivityList::new(),
            activity_sub: None,
            contacts_sub: None,
            loading: true,
        };

        let span = info_span!("feed.open", owner = %feed.owner);
        async {
            feed.contacts = feed.load_contacts().await;
            feed.subscribe_contacts().await;
            feed.replace_activity_subscription().await;
            feed.reload_snapshot().await;
        }
        .instrument(span)
        .await;

        feed.loading = false;
        Ok(feed)
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn context(&self) -> FeedContext {
        self.context.clone()
    }

    pub fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    pub fn entries(&self) -> &[EnrichedActivity] {
        self.list.entries()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_activity_subscription(&self) -> bool {
        self.activity_sub.is_some()
    }

    pub fn has_contacts_subscription(&self) -> bool {
        self.contacts_sub.is_some()
    }

    /// Fetch the owner's contacts; any failure yields an empty book
    pub async fn load_contacts(&self) -> ContactBook {
        match self.try_load_contacts().await {
            Ok(book) => book,
            Err(err) => {
                event!(Level::WARN, error = %err, owner = %self.owner, "failed to load contacts");
                ContactBook::new()
            }
        }
    }

    async fn try_load_contacts(&self) -> Result<ContactBook> {
        let query = Select::from_table(&self.config.contacts_table)
            .filter(RowFilter::equals(
                &self.config.owner_column,
                self.owner.as_str(),
            ))
            .order_by(OrderBy::asc(&self.config.contacts_order_column))
            .limit(self.config.contact_limit);

        let rows = self.backend.select(&query).await?;
        let id_column = self.config.contact_column.as_str();
        let entries = rows.iter().filter_map(|row| match ContactEntry::from_row(row, id_column) {
            Ok(entry) => Some(entry),
            Err(err) => {
                event!(Level::WARN, error = %err, "skipping malformed contact row");
                None
            }
        });
        Ok(ContactBook::from_entries(entries))
    }

    /// Fetch activity rows for the given users; no query is issued for an empty set
    pub async fn load_snapshot(&self, contact_ids: &[UserId]) -> Result<Vec<ActivityRecord>> {
        if contact_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = Select::from_table(&self.config.activity_table)
            .filter(RowFilter::user_ids(&self.config.key_column, contact_ids));
        let rows = self.backend.select(&query).await?;

        Ok(rows
            .iter()
            .filter_map(|row| match ActivityRecord::from_row(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    event!(Level::WARN, error = %err, "skipping malformed activity row");
                    None
                }
            })
            .collect())
    }

    /// Re-fetch contacts and the snapshot, keeping the current streams.
    ///
    /// Returns whether the visible list changed.
    pub async fn refresh(&mut self) -> bool {
        let span = info_span!("feed.refresh", owner = %self.owner);
        async {
            self.loading = true;
            let changed = match self.try_load_contacts().await {
                Ok(book) if self.context.is_active() => {
                    self.contacts = book;
                    self.reload_snapshot().await
                }
                Ok(_) => false,
                Err(err) => {
                    event!(Level::WARN, error = %err, "refresh kept previous contacts");
                    self.reload_snapshot().await
                }
            };
            self.loading = false;
            changed
        }
        .instrument(span)
        .await
    }

    /// React to a change in the owner's contact list.
    ///
    /// Re-fetches contacts, swaps the activity stream onto the new id set and
    /// rebuilds the list from a fresh snapshot. If the contacts fetch fails the
    /// previous contacts, stream and list are kept.
    pub async fn on_contacts_changed(&mut self) -> bool {
        let span = info_span!("feed.contacts_changed", owner = %self.owner);
        async {
            self.loading = true;
            let changed = match self.try_load_contacts().await {
                Ok(book) if self.context.is_active() => {
                    self.contacts = book;
                    self.replace_activity_subscription().await;
                    self.reload_snapshot().await
                }
                Ok(_) => false,
                Err(err) => {
                    event!(Level::WARN, error = %err, "contacts re-fetch failed; keeping previous view");
                    false
                }
            };
            self.loading = false;
            changed
        }
        .instrument(span)
        .await
    }

    /// Fetch the snapshot for the current contacts and rebuild the list.
    ///
    /// On failure the previous list stays in place, even if it holds entries
    /// for users that are no longer contacts.
    async fn reload_snapshot(&mut self) -> bool {
        let ids = self.contacts.ids().to_vec();
        match self.load_snapshot(&ids).await {
            Ok(records) => {
                if !self.context.is_active() {
                    event!(Level::DEBUG, "discarding snapshot fetched after teardown");
                    return false;
                }
                let rebuilt = ActivityList::from_snapshot(&records, &self.contacts);
                let changed = rebuilt != self.list;
                self.list = rebuilt;
                event!(Level::DEBUG, entries = self.list.len(), "snapshot applied");
                changed
            }
            Err(err) => {
                event!(Level::WARN, error = %err, "failed to load activity snapshot");
                false
            }
        }
    }

    /// Validate and apply one activity payload; malformed payloads are dropped
    pub fn handle_activity_payload(&mut self, payload: &ChangePayload) -> Option<Applied> {
        match RowChange::<ActivityRecord>::validate(payload, &self.config.key_column) {
            Ok(change) => Some(self.list.apply(change, &self.contacts)),
            Err(err) => {
                event!(Level::DEBUG, error = %err, "dropping activity payload");
                None
            }
        }
    }

    async fn subscribe_contacts(&mut self) {
        let spec = SubscriptionSpec::new(&self.config.contacts_channel, &self.config.contacts_table)
            .filter(RowFilter::equals(
                &self.config.owner_column,
                self.owner.as_str(),
            ));
        match self.backend.subscribe(spec).await {
            Ok(sub) => self.contacts_sub = Some(sub),
            Err(err) => {
                event!(Level::WARN, error = %err, "contacts subscription failed");
            }
        }
    }

    /// Close the current activity stream and open one scoped to the current contacts.
    ///
    /// With no contacts there is nothing to watch and no stream is opened.
    pub async fn replace_activity_subscription(&mut self) {
        if let Some(old) = self.activity_sub.take() {
            if let Err(err) = self.backend.unsubscribe(old).await {
                event!(Level::WARN, error = %err, "failed to close activity subscription");
            }
        }

        if self.contacts.is_empty() {
            event!(Level::DEBUG, "no contacts; activity stream left closed");
            return;
        }

        let filter = RowFilter::user_ids(&self.config.key_column, self.contacts.ids());
        let scope = filter.to_string();
        let spec = SubscriptionSpec::new(&self.config.activity_channel, &self.config.activity_table)
            .filter(filter);
        match self.backend.subscribe(spec).await {
            Ok(sub) => {
                event!(Level::DEBUG, subscription = %sub.id(), filter = %scope, "activity subscription opened");
                self.activity_sub = Some(sub);
            }
            Err(err) => {
                event!(Level::WARN, error = %err, "activity subscription failed");
            }
        }
    }

    /// Wait for the next payload from either stream.
    ///
    /// Contacts changes are preferred when both streams are ready. A stream
    /// closed by the backend is dropped from the wait set.
    pub async fn next_event(&mut self) -> FeedEvent {
        loop {
            if self.activity_sub.is_none() && self.contacts_sub.is_none() {
                return FeedEvent::Idle;
            }
            tokio::select! {
                biased;
                payload = recv_from(&mut self.contacts_sub) => match payload {
                    Some(payload) => return FeedEvent::ContactsChanged(payload),
                    None => {
                        event!(Level::WARN, "contacts stream closed by backend");
                        self.contacts_sub = None;
                    }
                },
                payload = recv_from(&mut self.activity_sub) => match payload {
                    Some(payload) => return FeedEvent::Activity(payload),
                    None => {
                        event!(Level::WARN, "activity stream closed by backend");
                        self.activity_sub = None;
                    }
                },
            }
        }
    }

    /// Apply an event; returns whether the visible list changed.
    ///
    /// Contacts changes already queued behind this one are folded into a
    /// single refresh.
    pub async fn handle_event(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Activity(payload) => matches!(
                self.handle_activity_payload(&payload),
                Some(Applied::Inserted | Applied::Replaced | Applied::Removed)
            ),
            FeedEvent::ContactsChanged(_) => {
                if let Some(sub) = self.contacts_sub.as_mut() {
                    let mut coalesced = 0usize;
                    while sub.try_recv().is_some() {
                        coalesced += 1;
                    }
                    if coalesced > 0 {
                        event!(Level::DEBUG, coalesced, "coalesced contacts changes");
                    }
                }
                self.on_contacts_changed().await
            }
            FeedEvent::Idle => false,
        }
    }

    /// Tear down: stop applying results and close both streams
    pub async fn close(&mut self) {
        self.context.deactivate();
        for sub in [self.activity_sub.take(), self.contacts_sub.take()]
            .into_iter()
            .flatten()
        {
            let id = sub.id();
            if let Err(err) = self.backend.unsubscribe(sub).await {
                event!(Level::WARN, error = %err, subscription = %id, "unsubscribe failed");
            }
        }
        event!(Level::DEBUG, owner = %self.owner, "feed closed");
    }
}

async fn recv_from(sub: &mut Option<Subscription>) -> Option<ChangePayload> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}
