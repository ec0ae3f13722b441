//! services/reminderd/src/engine/poller.rs
//!
//! The polling loop that turns due reminders into alert sessions.
//!
//! Each tick either finds the alert machine busy and does nothing, or picks the
//! single most overdue reminder, commits its next occurrence (or deletion) to
//! the store, and only then opens an alert for it. A reminder therefore fires
//! at most once per due time even if the daemon restarts mid-alert.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use reminder_core::domain::{Reminder, ReminderId, TimeRange};
use reminder_core::ports::{PortError, PortResult, ReminderStore};
use reminder_core::recurrence::{advance, advance_past};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::alert::AlertController;

/// Which reminders a tick looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    /// Every stored reminder, so anything missed while the daemon was down fires.
    All,
    /// Only reminders due since local midnight.
    Today,
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Upper bound on a single store call.
    pub store_timeout: Duration,
    pub scan_scope: ScanScope,
    /// Move overdue recurring reminders straight to their next future slot
    /// instead of one period at a time.
    pub skip_missed: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            store_timeout: Duration::from_secs(5),
            scan_scope: ScanScope::All,
            skip_missed: false,
        }
    }
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// An alert was already announcing; the store was not touched.
    Busy,
    /// Nothing was due.
    Idle,
    /// The reminder was committed and an alert opened for it.
    Fired {
        id: ReminderId,
        /// `None` when the reminder was deleted.
        next_due_at: Option<i64>,
    },
    /// The store rejected the reminder's own data, so it was deleted unannounced.
    Discarded(ReminderId),
    /// A store call failed; the tick was abandoned and no alert opened.
    Abandoned(PortError),
}

pub struct ReminderPoller {
    store: Arc<dyn ReminderStore>,
    alerts: Arc<AlertController>,
    settings: PollerSettings,
}

impl ReminderPoller {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        alerts: Arc<AlertController>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            store,
            alerts,
            settings,
        }
    }

    /// Polls every `interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            scope = ?self.settings.scan_scope,
            "Reminder poller started."
        );
        loop {
            let outcome = self.tick(chrono::Utc::now().timestamp()).await;
            debug!(?outcome, "Poll tick finished.");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reminder poller stopped.");
                    return;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }

    /// Runs one poll at `now` (epoch seconds).
    pub async fn tick(&self, now: i64) -> TickOutcome {
        if self.alerts.is_busy().await {
            return TickOutcome::Busy;
        }

        let reminders = match self.with_timeout(self.store.list(self.scan_range(now))).await {
            Ok(reminders) => reminders,
            Err(e) => {
                error!("Failed to list reminders: {}", e);
                return TickOutcome::Abandoned(e);
            }
        };

        let Some(reminder) = pick_due(reminders, now) else {
            return TickOutcome::Idle;
        };

        let next_due_at = if self.settings.skip_missed {
            advance_past(reminder.due_at, &reminder.frequency, now)
        } else {
            advance(reminder.due_at, &reminder.frequency)
        };

        match self.commit(&reminder, next_due_at).await {
            Ok(()) => {}
            Err(PortError::InvalidInput(reason)) => return self.discard(&reminder, &reason).await,
            Err(e) => {
                error!(id = reminder.id, "Failed to reschedule reminder: {}", e);
                return TickOutcome::Abandoned(e);
            }
        }

        info!(
            id = reminder.id,
            frequency = %reminder.frequency,
            due_at = reminder.due_at,
            next_due_at = ?next_due_at,
            "Reminder fired."
        );
        if let Err(e) = self.alerts.open(&reminder.text).await {
            warn!(id = reminder.id, "Could not open alert: {}", e);
        }

        TickOutcome::Fired {
            id: reminder.id,
            next_due_at,
        }
    }

    async fn commit(&self, reminder: &Reminder, next_due_at: Option<i64>) -> PortResult<()> {
        match next_due_at {
            Some(due_at) => {
                self.with_timeout(self.store.update(
                    reminder.id,
                    &reminder.text,
                    due_at,
                    &reminder.frequency,
                ))
                .await
            }
            None => self.with_timeout(self.store.delete(reminder.id)).await,
        }
    }

    /// Drops a reminder whose stored data cannot be written back. Leaving it
    /// would make it the earliest due row on every tick.
    async fn discard(&self, reminder: &Reminder, reason: &str) -> TickOutcome {
        warn!(id = reminder.id, "Discarding malformed reminder: {}", reason);
        match self.with_timeout(self.store.delete(reminder.id)).await {
            Ok(()) => TickOutcome::Discarded(reminder.id),
            Err(e) => {
                error!(id = reminder.id, "Failed to discard malformed reminder: {}", e);
                TickOutcome::Abandoned(e)
            }
        }
    }

    fn scan_range(&self, now: i64) -> Option<TimeRange> {
        match self.settings.scan_scope {
            ScanScope::All => None,
            ScanScope::Today => Some(TimeRange::new(local_day_start(now).unwrap_or(now), now)),
        }
    }

    async fn with_timeout<T, F>(&self, call: F) -> PortResult<T>
    where
        F: std::future::Future<Output = PortResult<T>>,
    {
        tokio::time::timeout(self.settings.store_timeout, call)
            .await
            .map_err(|_| {
                PortError::Timeout(format!(
                    "Store call exceeded {}s",
                    self.settings.store_timeout.as_secs_f32()
                ))
            })?
    }
}

/// The most overdue reminder at `now`; ties go to the lowest id.
pub fn pick_due(reminders: Vec<Reminder>, now: i64) -> Option<Reminder> {
    reminders
        .into_iter()
        .filter(|r| r.is_due(now))
        .min_by_key(|r| (r.due_at, r.id))
}

fn local_day_start(now: i64) -> Option<i64> {
    let midnight = Local
        .timestamp_opt(now, 0)
        .single()?
        .date_naive()
        .and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|start| start.timestamp())
}
