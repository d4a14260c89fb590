use chrono::{DateTime, Days, NaiveDate, TimeDelta, TimeZone};
use std::collections::BTreeSet;

/// Number of consecutive calendar days, ending on `today`, with at least one
/// check-in. A day with several check-ins counts once; a streak that does not
/// include `today` is zero.
pub fn current_streak<Tz: TimeZone>(checkins: &[DateTime<Tz>], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = checkins.iter().map(DateTime::date_naive).collect();

    let mut streak = 0;
    let mut day = today;
    while days.contains(&day) {
        streak += 1;
        match day.checked_sub_days(Days::new(1)) {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

pub fn checked_in_on<Tz: TimeZone>(checkins: &[DateTime<Tz>], day: NaiveDate) -> bool {
    checkins.iter().any(|c| c.date_naive() == day)
}

/// Time left until the next local midnight
pub fn remaining_in_day<Tz: TimeZone>(now: &DateTime<Tz>) -> TimeDelta {
    let tz = now.timezone();
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest());

    match next_midnight {
        Some(midnight) => (midnight - now.clone()).max(TimeDelta::zero()),
        None => TimeDelta::zero(),
    }
}

/// Fraction of the current day that has elapsed, in `0.0..=1.0`
pub fn day_progress<Tz: TimeZone>(now: &DateTime<Tz>) -> f64 {
    let day = TimeDelta::days(1).num_milliseconds() as f64;
    let left = remaining_in_day(now).num_milliseconds() as f64;
    ((day - left) / day).clamp(0.0, 1.0)
}
