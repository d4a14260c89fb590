pub mod activity_feed;
pub mod reconcile;
pub mod session;
pub mod sort;

pub use activity_feed::{ActivityFeed, FeedContext, FeedEvent};
pub use reconcile::{ActivityList, Applied, enrich};
pub use session::FeedSession;
pub use sort::{compare_activity, is_sorted, resort};
