use super::query::{RowFilter, Select};
use super::{ChangeFeed, Identity, QueryBackend, TableWriter};
use crate::core::{FeedError, Result, Row, UserId};
use crate::realtime::{ChangePayload, Subscription, SubscriptionId, SubscriptionSpec};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

struct Subscriber {
    spec: SubscriptionSpec,
    sender: mpsc::UnboundedSender<ChangePayload>,
}

#[derive(Default)]
struct Faults {
    failing_selects: usize,
    failing_subscribes: usize,
    failing_tables: HashSet<String>,
    failing_subscription_tables: HashSet<String>,
}

/// In-process stand-in for the hosted service.
///
/// Tables are plain row vectors. Every mutation publishes a change payload to
/// the subscriptions whose spec accepts it, in mutation order. Faults can be
/// injected to exercise the feed's degradation paths.
#[derive(Default)]
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    identity: RwLock<Option<UserId>>,
    faults: RwLock<Faults>,
    selects: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with the given (empty) tables already created
    pub async fn with_tables(tables: &[&str]) -> Self {
        let backend = Self::new();
        for table in tables {
            backend.create_table(table).await;
        }
        backend
    }

    pub async fn create_table(&self, name: &str) {
        self.tables
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    pub async fn sign_in(&self, user: UserId) {
        *self.identity.write().await = Some(user);
    }

    pub async fn insert(&self, table: &str, row: Row) -> Result<()> {
        {
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| FeedError::TableNotFound(table.to_string()))?;
            rows.push(row.clone());
        }
        self.publish(ChangePayload::insert(table, row)).await;
        Ok(())
    }

    /// Merge `patch` into every matching row; returns the number of rows changed
    pub async fn update_where(&self, table: &str, filter: &RowFilter, patch: Row) -> Result<usize> {
        let mut changes = Vec::new();
        {
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| FeedError::TableNotFound(table.to_string()))?;
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                let old = row.clone();
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                changes.push(ChangePayload::update(table, row.clone(), Some(old)));
            }
        }
        let count = changes.len();
        for change in changes {
            self.publish(change).await;
        }
        Ok(count)
    }

    /// Update the row whose `key_column` equals the row's key, or insert it
    pub async fn upsert(&self, table: &str, key_column: &str, row: Row) -> Result<()> {
        let key = row
            .get(key_column)
            .cloned()
            .ok_or_else(|| FeedError::malformed(format!("upsert row without '{key_column}'")))?;
        let filter = RowFilter::equals(key_column, key);
        if self.update_where(table, &filter, row.clone()).await? == 0 {
            self.insert(table, row).await?;
        }
        Ok(())
    }

    /// Remove every matching row; returns the number of rows removed
    pub async fn delete_where(&self, table: &str, filter: &RowFilter) -> Result<usize> {
        let removed = {
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| FeedError::TableNotFound(table.to_string()))?;
            let (removed, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|r| filter.matches(r));
            *rows = kept;
            removed
        };
        let count = removed.len();
        for old in removed {
            self.publish(ChangePayload::delete(table, old)).await;
        }
        Ok(count)
    }

    pub async fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .ok_or_else(|| FeedError::TableNotFound(table.to_string()))
    }

    /// Deliver a payload to every accepting subscriber, pruning closed ones
    pub async fn publish(&self, payload: ChangePayload) {
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.spec.accepts(&payload) {
                    continue;
                }
                if subscriber.sender.send(payload.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }
        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                debug!(subscription = %id, "pruning closed subscription");
                subscribers.remove(&id);
            }
        }
    }

    /// Fail the next `count` selects with a backend error
    pub async fn fail_next_selects(&self, count: usize) {
        self.faults.write().await.failing_selects = count;
    }

    /// Fail the next `count` subscribe calls with a backend error
    pub async fn fail_next_subscribes(&self, count: usize) {
        self.faults.write().await.failing_subscribes = count;
    }

    /// Fail every select on `table` until `heal_table` is called
    pub async fn fail_table(&self, table: &str) {
        self.faults
            .write()
            .await
            .failing_tables
            .insert(table.to_string());
    }

    pub async fn heal_table(&self, table: &str) {
        self.faults.write().await.failing_tables.remove(table);
    }

    /// Refuse every subscription on `table` until `heal_subscriptions` is called
    pub async fn fail_subscriptions(&self, table: &str) {
        self.faults
            .write()
            .await
            .failing_subscription_tables
            .insert(table.to_string());
    }

    pub async fn heal_subscriptions(&self, table: &str) {
        self.faults
            .write()
            .await
            .failing_subscription_tables
            .remove(table);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub fn select_count(&self) -> u64 {
        self.selects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QueryBackend for InMemoryBackend {
    async fn select(&self, query: &Select) -> Result<Vec<Row>> {
        self.selects.fetch_add(1, Ordering::Relaxed);
        {
            let mut faults = self.faults.write().await;
            if faults.failing_selects > 0 {
                faults.failing_selects -= 1;
                return Err(FeedError::backend(format!(
                    "injected failure selecting from '{}'",
                    query.table
                )));
            }
            if faults.failing_tables.contains(&query.table) {
                return Err(FeedError::backend(format!(
                    "table '{}' is unavailable",
                    query.table
                )));
            }
        }

        let rows = self.rows(&query.table).await?;
        Ok(query.apply(rows))
    }
}

#[async_trait]
impl TableWriter for InMemoryBackend {
    async fn insert_row(&self, table: &str, row: Row) -> Result<()> {
        self.insert(table, row).await
    }

    async fn delete_rows(&self, table: &str, filter: &RowFilter) -> Result<usize> {
        self.delete_where(table, filter).await
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription> {
        {
            let mut faults = self.faults.write().await;
            if faults.failing_subscribes > 0 {
                faults.failing_subscribes -= 1;
                return Err(FeedError::backend(format!(
                    "injected failure subscribing to '{}'",
                    spec.channel
                )));
            }
            if faults.failing_subscription_tables.contains(&spec.table) {
                return Err(FeedError::backend(format!(
                    "change feed for '{}' is unavailable",
                    spec.table
                )));
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::generate();
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                spec: spec.clone(),
                sender,
            },
        );
        debug!(subscription = %id, channel = %spec.channel, "subscription opened");
        Ok(Subscription::new(id, spec, receiver))
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<()> {
        let id = subscription.id();
        match self.subscribers.write().await.remove(&id) {
            Some(_) => {
                debug!(subscription = %id, "subscription closed");
                Ok(())
            }
            None => Err(FeedError::SubscriptionNotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl Identity for InMemoryBackend {
    async fn current_user_id(&self) -> Result<Option<UserId>> {
        Ok(self.identity.read().await.clone())
    }
}
