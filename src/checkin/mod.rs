pub mod contacts;
pub mod journal;
pub mod streak;

pub use contacts::replace_contacts;
pub use journal::{Checkin, load_checkins, load_streak, record_checkin};
pub use streak::{checked_in_on, current_streak, day_progress, remaining_in_day};
