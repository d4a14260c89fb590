pub mod error;
pub mod timestamp;
pub mod types;

pub use error::{FeedError, Result};
pub use timestamp::{lenient_timestamp, parse_timestamp};
pub use types::{Priority, Row, UserId};
