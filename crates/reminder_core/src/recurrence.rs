//! crates/reminder_core/src/recurrence.rs
//!
//! Maps a reminder's current due time and frequency to its next due time.
//!
//! Monthly reminders move by 30 calendar days on the local wall clock rather
//! than by a fixed number of seconds. When the target wall-clock time is
//! ambiguous the earliest instant wins; when it falls in a gap the offset that
//! applied at the original due time is kept.

use chrono::{Duration, LocalResult, Offset, TimeZone};

use crate::domain::Frequency;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// Calendar days added per monthly occurrence.
pub const MONTHLY_DAYS: i64 = 30;

/// Next due time after `due_at`, or `None` when the reminder should be deleted.
///
/// Uses the local time zone for monthly arithmetic.
pub fn advance(due_at: i64, frequency: &Frequency) -> Option<i64> {
    advance_in(due_at, frequency, &chrono::Local)
}

/// [`advance`] with an explicit time zone for the calendar arithmetic.
pub fn advance_in<Tz: TimeZone>(due_at: i64, frequency: &Frequency, tz: &Tz) -> Option<i64> {
    match frequency {
        Frequency::Daily => due_at.checked_add(SECONDS_PER_DAY),
        Frequency::Weekly => due_at.checked_add(SECONDS_PER_WEEK),
        Frequency::Monthly => add_calendar_days(due_at, MONTHLY_DAYS, tz),
        Frequency::OneTime | Frequency::Unknown(_) => None,
    }
}

/// Advances repeatedly until the result is strictly after `now`.
pub fn advance_past(due_at: i64, frequency: &Frequency, now: i64) -> Option<i64> {
    advance_past_in(due_at, frequency, now, &chrono::Local)
}

pub fn advance_past_in<Tz: TimeZone>(
    due_at: i64,
    frequency: &Frequency,
    now: i64,
    tz: &Tz,
) -> Option<i64> {
    let mut next = advance_in(due_at, frequency, tz)?;
    if next > now {
        return Some(next);
    }

    if let Some(period) = fixed_period(frequency) {
        let steps = now.checked_sub(next)?.checked_div(period)?.checked_add(1)?;
        return next.checked_add(steps.checked_mul(period)?);
    }

    while next <= now {
        next = advance_in(next, frequency, tz)?;
    }
    Some(next)
}

/// Due time for a reminder the user asked to schedule at `requested`.
///
/// A recurring reminder requested in the past starts at its next future
/// occurrence. Everything else keeps the requested time.
pub fn first_due_at(requested: i64, frequency: &Frequency, now: i64) -> i64 {
    first_due_at_in(requested, frequency, now, &chrono::Local)
}

pub fn first_due_at_in<Tz: TimeZone>(
    requested: i64,
    frequency: &Frequency,
    now: i64,
    tz: &Tz,
) -> i64 {
    if requested >= now || !frequency.is_recurring() {
        return requested;
    }
    advance_past_in(requested, frequency, now, tz).unwrap_or(requested)
}

fn fixed_period(frequency: &Frequency) -> Option<i64> {
    match frequency {
        Frequency::Daily => Some(SECONDS_PER_DAY),
        Frequency::Weekly => Some(SECONDS_PER_WEEK),
        _ => None,
    }
}

fn add_calendar_days<Tz: TimeZone>(due_at: i64, days: i64, tz: &Tz) -> Option<i64> {
    let start = tz.timestamp_opt(due_at, 0).single()?;
    let target = start
        .naive_local()
        .checked_add_signed(Duration::try_days(days)?)?;

    let next = match tz.from_local_datetime(&target) {
        LocalResult::Single(at) => at.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        LocalResult::None => {
            let offset = i64::from(start.offset().fix().local_minus_utc());
            target.and_utc().timestamp().checked_sub(offset)?
        }
    };

    (next > due_at).then_some(next)
}
