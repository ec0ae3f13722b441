//! crates/reminder_core/src/ports.rs
//!
//! Defines the service contracts (traits) the scheduling engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the speech backend and the alert UI.

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::domain::{Clip, Frequency, Reminder, ReminderId, TimeRange};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Resolves when the user dismisses an alert.
///
/// Both a sent value and a dropped sender (the surface went away) count as a
/// dismissal.
pub type DismissSignal = oneshot::Receiver<()>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Inserts a reminder and returns its new id.
    async fn add(&self, text: &str, due_at: i64, frequency: &Frequency) -> PortResult<ReminderId>;

    async fn get(&self, id: ReminderId) -> PortResult<Reminder>;

    /// Lists reminders ordered by ascending `due_at`, optionally restricted to a window.
    async fn list(&self, range: Option<TimeRange>) -> PortResult<Vec<Reminder>>;

    async fn update(
        &self,
        id: ReminderId,
        text: &str,
        due_at: i64,
        frequency: &Frequency,
    ) -> PortResult<()>;

    async fn delete(&self, id: ReminderId) -> PortResult<()>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders text into a playable clip. May be slow (network-bound).
    async fn synthesize(&self, text: &str) -> PortResult<Clip>;
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Starts playing a clip. Returns once playback has begun, not when it ends.
    async fn play(&self, clip: &Clip) -> PortResult<()>;

    /// Stops whatever is currently playing. Stopping while silent is not an error.
    async fn stop(&self) -> PortResult<()>;
}

#[async_trait]
pub trait AlertSurface: Send + Sync {
    /// Raises the alert for `text` and hands back the signal fired on dismissal.
    async fn show_alert(&self, text: &str) -> PortResult<DismissSignal>;

    /// Tears the alert down. Hiding when nothing is shown is not an error.
    async fn hide_alert(&self) -> PortResult<()>;
}
