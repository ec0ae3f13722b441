//! services/reminderd/src/engine/alert.rs
//!
//! The alert/playback state machine.
//!
//! `Idle -> Announcing` happens in [`AlertController::open`]. While announcing,
//! a session task shows the alert, synthesizes the text once, and replays the
//! clip every `clip duration + replay pad`. The session ends when the surface
//! reports a dismissal, when [`AlertController::dismiss`] is called, or when the
//! optional maximum duration elapses. Teardown always runs in the same order:
//! stop audio, hide the alert, clear the session.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use reminder_core::domain::AlertSession;
use reminder_core::ports::{AlertSurface, AudioPlayer, DismissSignal, SpeechSynthesizer};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::state::{ActiveSession, AlertMode};

/// Lower bound on the replay cadence, so a zero-length clip cannot spin.
const MIN_REPLAY_CADENCE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Silence between the end of one replay and the start of the next.
    pub replay_pad: Duration,
    /// Auto-dismiss after this long. `None` waits for the user.
    pub max_duration: Option<Duration>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            replay_pad: Duration::from_secs(3),
            max_duration: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert session {0} is already active")]
    Busy(Uuid),
}

#[derive(Debug)]
enum EndReason {
    Dismissed,
    SurfaceDismissed,
    TimedOut,
}

/// Owns the at-most-one active alert session.
pub struct AlertController {
    surface: Arc<dyn AlertSurface>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    settings: AlertSettings,
    active: Mutex<Option<ActiveSession>>,
}

impl AlertController {
    pub fn new(
        surface: Arc<dyn AlertSurface>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        settings: AlertSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            surface,
            synthesizer,
            player,
            settings,
            active: Mutex::new(None),
        })
    }

    /// True while a session is announcing. This is all the poller gets to see.
    pub async fn is_busy(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn mode(&self) -> AlertMode {
        if self.is_busy().await {
            AlertMode::Announcing
        } else {
            AlertMode::Idle
        }
    }

    pub async fn current(&self) -> Option<AlertSession> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|entry| entry.session.clone())
    }

    /// Enters `Announcing` for `reminder_text`.
    ///
    /// The session is recorded before any rendering or synthesis starts, so
    /// `is_busy` is true as soon as this returns.
    pub async fn open(self: &Arc<Self>, reminder_text: &str) -> Result<AlertSession, AlertError> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            return Err(AlertError::Busy(existing.session.id));
        }

        let mut entry = ActiveSession::new(reminder_text);
        let session = entry.session.clone();
        let task = {
            let controller = self.clone();
            let session = session.clone();
            let token = entry.cancellation_token.clone();
            tokio::spawn(async move { controller.run_session(session, token).await })
        };
        entry.task = Some(task);
        *active = Some(entry);

        info!(session_id = %session.id, "Alert session opened.");
        Ok(session)
    }

    /// Dismisses the active session and waits for its teardown to finish.
    ///
    /// Returns `false` when nothing was announcing. Once this returns, audio has
    /// been stopped and no further playback will start for the session.
    pub async fn dismiss(&self) -> bool {
        let (session_id, task) = {
            let mut active = self.active.lock().await;
            let Some(entry) = active.as_mut() else {
                return false;
            };
            entry.cancellation_token.cancel();
            (entry.session.id, entry.task.take())
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(session_id = %session_id, "Alert session task failed: {:?}", e);
            }
        }
        self.release(session_id).await;
        true
    }

    /// Clears the slot if it still belongs to `session_id`.
    async fn release(&self, session_id: Uuid) {
        let mut active = self.active.lock().await;
        if active
            .as_ref()
            .is_some_and(|entry| entry.session.id == session_id)
        {
            *active = None;
        }
    }

    async fn run_session(self: Arc<Self>, session: AlertSession, token: CancellationToken) {
        let reason = tokio::select! {
            biased;
            _ = token.cancelled() => EndReason::Dismissed,
            reason = self.present(&session, &token) => reason,
        };
        token.cancel();

        if let Err(e) = self.player.stop().await {
            warn!(session_id = %session.id, "Failed to stop playback: {}", e);
        }
        if let Err(e) = self.surface.hide_alert().await {
            warn!(session_id = %session.id, "Failed to hide alert: {}", e);
        }
        self.release(session.id).await;

        let shown_for = chrono::Utc::now() - session.started_at;
        info!(
            session_id = %session.id,
            reason = ?reason,
            shown_secs = shown_for.num_seconds(),
            "Alert session closed."
        );
    }

    /// Shows the alert and announces until the surface or the deadline ends it.
    async fn present(&self, session: &AlertSession, token: &CancellationToken) -> EndReason {
        let signal = match self.surface.show_alert(&session.reminder_text).await {
            Ok(signal) => Some(signal),
            Err(e) => {
                error!(session_id = %session.id, "Failed to show alert: {}", e);
                None
            }
        };

        let deadline = async {
            match self.settings.max_duration {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = wait_for_dismissal(signal) => EndReason::SurfaceDismissed,
            _ = deadline => EndReason::TimedOut,
            never = self.announce(session, token) => match never {},
        }
    }

    /// Synthesizes once, then replays forever at the clip's cadence.
    async fn announce(&self, session: &AlertSession, token: &CancellationToken) -> Infallible {
        let clip = match self.synthesizer.synthesize(&session.reminder_text).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!(session_id = %session.id, "Speech synthesis failed; alert is visual only: {}", e);
                return std::future::pending().await;
            }
        };

        let cadence = (clip.duration + self.settings.replay_pad).max(MIN_REPLAY_CADENCE);
        loop {
            if !token.is_cancelled() {
                if let Err(e) = self.player.play(&clip).await {
                    warn!(session_id = %session.id, "Playback failed: {}", e);
                }
            }
            tokio::time::sleep(cadence).await;
        }
    }
}

/// Resolves once the surface dismisses the alert. Without a signal it never does.
async fn wait_for_dismissal(signal: Option<DismissSignal>) {
    match signal {
        // A dropped sender means the surface was closed, which also dismisses.
        Some(signal) => {
            let _ = signal.await;
        }
        None => std::future::pending::<()>().await,
    }
}
