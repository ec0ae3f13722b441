//! services/reminderd/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ReminderStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.

use std::str::FromStr;

use async_trait::async_trait;
use reminder_core::domain::{normalize_text, Frequency, Reminder, ReminderId, TimeRange};
use reminder_core::ports::{PortError, PortResult, ReminderStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReminderStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the database file if needed.
    pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SELECT_COLUMNS: &str = "SELECT id, text, frequency, CAST(time AS TEXT) AS time FROM reminders";

#[derive(FromRow)]
struct ReminderRecord {
    id: i64,
    text: String,
    frequency: String,
    time: Option<String>,
}

impl ReminderRecord {
    /// Rows whose `time` cannot be read as a timestamp come back as overdue,
    /// terminal reminders so they fire once and get cleaned up.
    fn to_domain(self) -> Reminder {
        match self.time.as_deref().and_then(parse_timestamp) {
            Some(due_at) => Reminder {
                id: self.id,
                text: self.text,
                due_at,
                frequency: Frequency::parse(&self.frequency),
            },
            None => {
                warn!(id = self.id, time = ?self.time, "Reminder has a malformed due time.");
                Reminder {
                    id: self.id,
                    text: self.text,
                    due_at: 0,
                    frequency: Frequency::Unknown(format!(
                        "<malformed due_at: {}>",
                        self.time.unwrap_or_default()
                    )),
                }
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && secs.abs() < i64::MAX as f64)
            .map(|secs| secs.trunc() as i64)
    })
}

fn map_err(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut => PortError::Timeout(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn checked_text(text: &str) -> PortResult<String> {
    normalize_text(text)
        .ok_or_else(|| PortError::InvalidInput("Reminder text must not be empty".to_string()))
}

//=========================================================================================
// `ReminderStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReminderStore for DbAdapter {
    async fn add(&self, text: &str, due_at: i64, frequency: &Frequency) -> PortResult<ReminderId> {
        let text = checked_text(text)?;
        let result = sqlx::query("INSERT INTO reminders (text, frequency, time) VALUES (?, ?, ?)")
            .bind(text)
            .bind(frequency.as_str())
            .bind(due_at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn get(&self, id: ReminderId) -> PortResult<Reminder> {
        let record = sqlx::query_as::<_, ReminderRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?
            .ok_or_else(|| PortError::NotFound(format!("Reminder {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn list(&self, range: Option<TimeRange>) -> PortResult<Vec<Reminder>> {
        let records = match range {
            Some(range) => {
                sqlx::query_as::<_, ReminderRecord>(&format!(
                    "{SELECT_COLUMNS} WHERE time >= ? AND time <= ? ORDER BY time ASC, id ASC"
                ))
                .bind(range.from)
                .bind(range.to)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ReminderRecord>(&format!(
                    "{SELECT_COLUMNS} ORDER BY time ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_err)?;

        let reminders = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(reminders)
    }

    async fn update(
        &self,
        id: ReminderId,
        text: &str,
        due_at: i64,
        frequency: &Frequency,
    ) -> PortResult<()> {
        let text = checked_text(text)?;
        let result = sqlx::query("UPDATE reminders SET text = ?, time = ?, frequency = ? WHERE id = ?")
            .bind(text)
            .bind(due_at)
            .bind(frequency.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reminder {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: ReminderId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reminder {} not found", id)));
        }
        Ok(())
    }
}
