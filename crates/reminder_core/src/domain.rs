//! crates/reminder_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Store-assigned identifier of a reminder.
pub type ReminderId = i64;

/// How a reminder reschedules itself after it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frequency {
    OneTime,
    Daily,
    Weekly,
    Monthly,
    /// A stored value that is not a known policy. Treated as terminal.
    Unknown(String),
}

impl Frequency {
    /// Parses a stored frequency value. Never fails: unrecognised values are
    /// kept verbatim in [`Frequency::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "one-time" | "onetime" | "once" => Frequency::OneTime,
            "daily" | "24hr" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            _ => Frequency::Unknown(raw.to_string()),
        }
    }

    /// The canonical text form written back to the store.
    pub fn as_str(&self) -> &str {
        match self {
            Frequency::OneTime => "one-time",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Unknown(raw) => raw,
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Frequency::Daily | Frequency::Weekly | Frequency::Monthly)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled text announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub text: String,
    /// Seconds since the Unix epoch.
    pub due_at: i64,
    pub frequency: Frequency,
}

impl Reminder {
    pub fn is_due(&self, now: i64) -> bool {
        self.due_at <= now
    }
}

/// Inclusive `[from, to]` window of epoch seconds used for range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: i64) -> bool {
        self.from <= at && at <= self.to
    }
}

/// Represents the one reminder currently being announced.
#[derive(Debug, Clone)]
pub struct AlertSession {
    pub id: Uuid,
    pub reminder_text: String,
    pub started_at: DateTime<Utc>,
}

/// A synthesized announcement ready for playback.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Encoded audio (WAV for the bundled adapters).
    pub audio: Bytes,
    pub duration: Duration,
}

/// Trims reminder text and rejects it when nothing is left.
pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_frequencies_and_aliases() {
        assert_eq!(Frequency::parse("one-time"), Frequency::OneTime);
        assert_eq!(Frequency::parse("Once"), Frequency::OneTime);
        assert_eq!(Frequency::parse("24hr"), Frequency::Daily);
        assert_eq!(Frequency::parse(" DAILY "), Frequency::Daily);
        assert_eq!(Frequency::parse("weekly"), Frequency::Weekly);
        assert_eq!(Frequency::parse("monthly"), Frequency::Monthly);
    }

    #[test]
    fn unknown_frequency_keeps_raw_value() {
        let freq = Frequency::parse("fortnightly");
        assert_eq!(freq, Frequency::Unknown("fortnightly".to_string()));
        assert_eq!(freq.as_str(), "fortnightly");
        assert!(!freq.is_recurring());
    }

    #[test]
    fn legacy_daily_alias_is_written_back_canonically() {
        assert_eq!(Frequency::parse("24hr").to_string(), "daily");
    }

    #[test]
    fn normalize_text_rejects_blank() {
        assert_eq!(normalize_text("  take pills \n"), Some("take pills".to_string()));
        assert_eq!(normalize_text("   "), None);
    }
}
