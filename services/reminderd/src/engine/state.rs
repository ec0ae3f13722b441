//! services/reminderd/src/engine/state.rs
//!
//! Defines the state held by the alert state machine for the one session it
//! may be announcing.

use chrono::Utc;
use reminder_core::domain::AlertSession;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// An enum representing the mode of the alert state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMode {
    Idle,
    Announcing,
}

/// The state for the single active alert session.
pub struct ActiveSession {
    pub session: AlertSession,
    /// A token to cancel the session's replay task.
    pub cancellation_token: CancellationToken,
    /// The replay task. Taken by whoever waits for the session to finish.
    pub task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Records a new session starting now.
    pub fn new(reminder_text: &str) -> Self {
        Self {
            session: AlertSession {
                id: Uuid::new_v4(),
                reminder_text: reminder_text.to_string(),
                started_at: Utc::now(),
            },
            cancellation_token: CancellationToken::new(),
            task: None,
        }
    }
}
