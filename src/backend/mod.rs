pub mod memory;
pub mod query;

use async_trait::async_trait;
use crate::core::{Result, Row, UserId};
use crate::realtime::{Subscription, SubscriptionSpec};

pub use memory::InMemoryBackend;
pub use query::{OrderBy, RowFilter, Select};

/// Read access to the hosted relational store.
///
/// The feed only ever issues select-all-columns queries with equality and
/// inclusion filters, ordering and a row limit.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Row>>;
}

/// Row writes used by the check-in log and contact list saves.
#[async_trait]
pub trait TableWriter: Send + Sync {
    async fn insert_row(&self, table: &str, row: Row) -> Result<()>;

    /// Remove every row matching `filter`; returns how many were removed
    async fn delete_rows(&self, table: &str, filter: &RowFilter) -> Result<usize>;
}

/// Row-level change subscriptions.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription; the returned handle owns the receiving side.
    async fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription>;

    /// Close a subscription previously returned by `subscribe`.
    async fn unsubscribe(&self, subscription: Subscription) -> Result<()>;
}

/// Identity of the signed-in caller.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn current_user_id(&self) -> Result<Option<UserId>>;
}

/// Everything the activity feed needs from the hosted service.
pub trait Backend: QueryBackend + ChangeFeed + Identity {}

impl<T> Backend for T where T: QueryBackend + ChangeFeed + Identity {}
