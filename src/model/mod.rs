pub mod activity;
pub mod contact;

pub use activity::{ActivityRecord, EnrichedActivity};
pub use contact::{ContactBook, ContactEntry};
