//! services/reminderd/src/cli.rs
//!
//! Argument parsing and command execution for `remindctl`, the tool used to
//! manage the reminders the daemon announces.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use clap::{Parser, Subcommand};
use reminder_core::domain::{normalize_text, Frequency, Reminder, ReminderId, TimeRange};
use reminder_core::ports::ReminderStore;
use reminder_core::recurrence::first_due_at;
use serde::Serialize;

use crate::error::DaemonError;

/// Manage the reminders announced by reminderd.
#[derive(Debug, Parser)]
#[command(name = "remindctl", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
///
/// `<WHEN>` is local time as "YYYY-MM-DD HH:MM", "HH:MM" (today) or "@<epoch seconds>".
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Schedule a new reminder.
    Add {
        /// Text to announce.
        #[arg(value_parser = parse_text)]
        text: String,

        /// When the reminder is first due.
        #[arg(long, value_parser = parse_when)]
        at: i64,

        /// one-time, daily, weekly or monthly.
        #[arg(long, default_value = "one-time", value_parser = parse_frequency)]
        frequency: Frequency,
    },

    /// List stored reminders in due order.
    List {
        /// Only reminders due today.
        #[arg(long)]
        today: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one reminder.
    Show { id: ReminderId },

    /// Change a reminder. Fields that are not given keep their stored values.
    #[command(group(
        clap::ArgGroup::new("change")
            .required(true)
            .multiple(true)
            .args(["text", "at", "frequency"])
    ))]
    Edit {
        id: ReminderId,

        #[arg(long, value_parser = parse_text)]
        text: Option<String>,

        #[arg(long, value_parser = parse_when)]
        at: Option<i64>,

        #[arg(long, value_parser = parse_frequency)]
        frequency: Option<Frequency>,
    },

    /// Delete a reminder.
    Delete { id: ReminderId },
}

/// Runs `command` against the store and returns what should be printed.
pub async fn execute(
    store: &dyn ReminderStore,
    command: Command,
    now: i64,
) -> Result<String, DaemonError> {
    match command {
        Command::Add { text, at, frequency } => {
            let due_at = first_due_at(at, &frequency, now);
            let id = store.add(&text, due_at, &frequency).await?;
            Ok(format!("added reminder {id} due {}", format_local(due_at)))
        }
        Command::List { today, json } => {
            let range = if today { Some(today_range(now)?) } else { None };
            let reminders = store.list(range).await?;
            if json {
                let views: Vec<ReminderView> = reminders.iter().map(ReminderView::from).collect();
                return serde_json::to_string_pretty(&views)
                    .map_err(|e| DaemonError::Internal(format!("Failed to encode reminders: {}", e)));
            }
            if reminders.is_empty() {
                return Ok("no reminders".to_string());
            }
            Ok(reminders.iter().map(format_row).collect::<Vec<_>>().join("\n"))
        }
        Command::Show { id } => {
            let reminder = store.get(id).await?;
            Ok(format_row(&reminder))
        }
        Command::Edit {
            id,
            text,
            at,
            frequency,
        } => {
            let existing = store.get(id).await?;
            let frequency = frequency.unwrap_or(existing.frequency);
            let due_at = match at {
                Some(at) => first_due_at(at, &frequency, now),
                None => existing.due_at,
            };
            let text = text.unwrap_or(existing.text);
            store.update(id, &text, due_at, &frequency).await?;
            Ok(format!("updated reminder {id} due {}", format_local(due_at)))
        }
        Command::Delete { id } => {
            store.delete(id).await?;
            Ok(format!("deleted reminder {id}"))
        }
    }
}

/// A reminder as printed by `list --json`.
#[derive(Debug, Serialize)]
pub struct ReminderView {
    pub id: ReminderId,
    pub text: String,
    pub frequency: String,
    pub due_at: i64,
    pub due_local: String,
}

impl From<&Reminder> for ReminderView {
    fn from(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            text: reminder.text.clone(),
            frequency: reminder.frequency.to_string(),
            due_at: reminder.due_at,
            due_local: format_local(reminder.due_at),
        }
    }
}

/// Parses `"YYYY-MM-DD HH:MM"`, `"HH:MM"` (today) or `"@<epoch>"` as local time.
pub fn parse_when(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Some(epoch) = raw.strip_prefix('@') {
        return epoch
            .parse::<i64>()
            .map_err(|_| format!("'{raw}' is not a valid epoch timestamp"));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| {
            NaiveTime::parse_from_str(raw, "%H:%M")
                .map(|time| Local::now().date_naive().and_time(time))
        })
        .map_err(|_| format!("'{raw}' is not a time like \"2024-05-01 09:30\" or \"09:30\""))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.timestamp())
        .ok_or_else(|| format!("'{raw}' does not exist in the local time zone"))
}

fn parse_frequency(raw: &str) -> Result<Frequency, String> {
    match Frequency::parse(raw) {
        Frequency::Unknown(other) => Err(format!(
            "unknown frequency '{other}' (use one-time|daily|weekly|monthly)"
        )),
        known => Ok(known),
    }
}

fn parse_text(raw: &str) -> Result<String, String> {
    normalize_text(raw).ok_or_else(|| "reminder text must not be empty".to_string())
}

fn today_range(now: i64) -> Result<TimeRange, DaemonError> {
    let today: NaiveDate = Local
        .timestamp_opt(now, 0)
        .single()
        .ok_or_else(|| DaemonError::Internal(format!("{now} is not a valid local time")))?
        .date_naive();
    let bound = |naive: Option<NaiveDateTime>| {
        naive
            .and_then(|n| Local.from_local_datetime(&n).earliest())
            .map(|at| at.timestamp())
            .ok_or_else(|| DaemonError::Internal(format!("cannot resolve the bounds of {today}")))
    };
    Ok(TimeRange::new(
        bound(today.and_hms_opt(0, 0, 0))?,
        bound(today.and_hms_opt(23, 59, 59))?,
    ))
}

fn format_local(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => format!("@{epoch}"),
    }
}

fn format_row(reminder: &Reminder) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        reminder.id,
        format_local(reminder.due_at),
        reminder.frequency,
        reminder.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DbAdapter;
    use sqlx::sqlite::SqlitePoolOptions;

    fn parse(raw: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("remindctl").chain(raw.iter().copied()))
            .map(|cli| cli.command)
    }

    async fn store() -> DbAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let adapter = DbAdapter::new(pool);
        adapter.run_migrations().await.unwrap();
        adapter
    }

    #[test]
    fn parses_add_with_frequency() {
        let command = parse(&["add", " stretch ", "--at", "@1000", "--frequency", "24hr"]).unwrap();
        assert_eq!(
            command,
            Command::Add {
                text: "stretch".to_string(),
                at: 1000,
                frequency: Frequency::Daily,
            }
        );
    }

    #[test]
    fn add_defaults_to_one_time() {
        let command = parse(&["add", "call", "--at", "@5"]).unwrap();
        assert!(matches!(command, Command::Add { frequency: Frequency::OneTime, .. }));
    }

    #[test]
    fn add_rejects_bad_input() {
        assert!(parse(&["add", "call"]).is_err());
        assert!(parse(&["add", "   ", "--at", "@5"]).is_err());
        assert!(parse(&["add", "call", "--at", "@5", "--frequency", "hourly"]).is_err());
        assert!(parse(&["add", "call", "--at"]).is_err());
        assert!(parse(&["add", "call", "--at", "@5", "--loud"]).is_err());
    }

    #[test]
    fn parses_list_switches() {
        assert_eq!(
            parse(&["list", "--json"]).unwrap(),
            Command::List { today: false, json: true }
        );
        assert_eq!(
            parse(&["list", "--today"]).unwrap(),
            Command::List { today: true, json: false }
        );
    }

    #[test]
    fn edit_needs_a_change() {
        assert!(parse(&["edit", "3"]).is_err());
        assert_eq!(
            parse(&["edit", "3", "--frequency", "weekly"]).unwrap(),
            Command::Edit {
                id: 3,
                text: None,
                at: None,
                frequency: Some(Frequency::Weekly),
            }
        );
    }

    #[test]
    fn ids_must_be_numeric() {
        assert!(parse(&["show", "abc"]).is_err());
        assert!(parse(&["delete"]).is_err());
        assert_eq!(parse(&["delete", "9"]).unwrap(), Command::Delete { id: 9 });
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_local_date_times() {
        let expected = Local
            .from_local_datetime(&NaiveDateTime::parse_from_str("2024-05-01 09:30", "%Y-%m-%d %H:%M").unwrap())
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(parse_when("2024-05-01 09:30").unwrap(), expected);
        assert_eq!(parse_when("@42").unwrap(), 42);
        assert!(parse_when("09:30").is_ok());
        assert!(parse_when("tomorrow").is_err());
    }

    #[tokio::test]
    async fn add_moves_past_daily_reminders_forward() {
        let store = store().await;
        let now = 1_700_000_000;
        let command = Command::Add {
            text: "water plants".to_string(),
            at: now - 3_600,
            frequency: Frequency::Daily,
        };
        execute(&store, command, now).await.unwrap();

        let stored = store.list(None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].due_at, now - 3_600 + 86_400);
    }

    #[tokio::test]
    async fn add_keeps_past_one_time_reminders_overdue() {
        let store = store().await;
        let now = 1_700_000_000;
        let command = Command::Add {
            text: "missed call".to_string(),
            at: now - 60,
            frequency: Frequency::OneTime,
        };
        execute(&store, command, now).await.unwrap();
        assert_eq!(store.list(None).await.unwrap()[0].due_at, now - 60);
    }

    #[tokio::test]
    async fn add_far_in_the_past_keeps_the_requested_time() {
        let store = store().await;
        let ancient = -9_223_372_036_854_000_000;
        let command = parse(&["add", "ancient", "--at", "@-9223372036854000000", "--frequency", "daily"]).unwrap();
        execute(&store, command, 1_700_000_000).await.unwrap();
        assert_eq!(store.list(None).await.unwrap()[0].due_at, ancient);
    }

    #[tokio::test]
    async fn edit_merges_with_the_stored_reminder() {
        let store = store().await;
        let id = store.add("old text", 5_000, &Frequency::Weekly).await.unwrap();

        let command = Command::Edit {
            id,
            text: Some("new text".to_string()),
            at: None,
            frequency: None,
        };
        execute(&store, command, 1_000).await.unwrap();

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.text, "new text");
        assert_eq!(stored.due_at, 5_000);
        assert_eq!(stored.frequency, Frequency::Weekly);
    }

    #[tokio::test]
    async fn list_json_includes_every_reminder() {
        let store = store().await;
        store.add("b", 200, &Frequency::Daily).await.unwrap();
        store.add("a", 100, &Frequency::OneTime).await.unwrap();

        let output = execute(&store, Command::List { today: false, json: true }, 0)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["text"], "a");
        assert_eq!(rows[1]["frequency"], "daily");
    }

    #[tokio::test]
    async fn missing_reminders_surface_as_errors() {
        let store = store().await;
        let result = execute(&store, Command::Delete { id: 77 }, 0).await;
        assert!(matches!(result, Err(DaemonError::Port(_))));
    }
}
