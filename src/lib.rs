// ============================================================================
// Check-in Activity Feed Library
// ============================================================================

pub mod core;
pub mod model;
pub mod backend;
pub mod realtime;
pub mod feed;
pub mod checkin;
pub mod config;

// Re-export main types for convenience
pub use crate::core::{FeedError, Priority, Result, Row, UserId, parse_timestamp};
pub use model::{ActivityRecord, ContactBook, ContactEntry, EnrichedActivity};
pub use config::FeedConfig;

// Backend seam and the in-process implementation
pub use backend::{
    Backend, ChangeFeed, Identity, InMemoryBackend, OrderBy, QueryBackend, RowFilter, Select,
    TableWriter,
};

pub use realtime::{
    ChangePayload, EventFilter, EventKind, RowChange, Subscription, SubscriptionId,
    SubscriptionSpec,
};

pub use feed::{
    ActivityFeed, ActivityList, Applied, FeedContext, FeedEvent, FeedSession, compare_activity,
    enrich, is_sorted, resort,
};
