pub mod change;
pub mod subscription;

pub use change::{ChangePayload, EventFilter, EventKind, RowChange};
pub use subscription::{Subscription, SubscriptionId, SubscriptionSpec};
