//! services/reminderd/src/bin/reminderd.rs

use async_openai::{config::OpenAIConfig, Client};
use reminder_core::ports::{AudioPlayer, ReminderStore, SpeechSynthesizer};
use reminderd_lib::{
    adapters::{CommandPlayer, DbAdapter, MutedSpeechAdapter, OpenAiTtsAdapter, TerminalSurface},
    config::{Config, PlayerBackend},
    engine::{AlertController, ReminderPoller},
    error::DaemonError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting reminder daemon...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Opening reminder store at {}", config.database_url);
    let db_pool = DbAdapter::connect(&config.database_url).await?;
    let db_adapter = DbAdapter::new(db_pool);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let store: Arc<dyn ReminderStore> = Arc::new(db_adapter);

    // --- 3. Initialize Service Adapters ---
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.openai_api_key.as_ref() {
        Some(api_key) => {
            let voice = OpenAiTtsAdapter::parse_voice(&config.tts_voice).ok_or_else(|| {
                DaemonError::Internal(format!(
                    "Invalid TTS voice specified in config: '{}'",
                    config.tts_voice
                ))
            })?;
            let model = OpenAiTtsAdapter::parse_model(&config.tts_model).ok_or_else(|| {
                DaemonError::Internal(format!(
                    "Invalid TTS model specified in config: '{}'",
                    config.tts_model
                ))
            })?;
            let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            Arc::new(OpenAiTtsAdapter::new(client, model, voice))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; reminders will be shown without speech.");
            Arc::new(MutedSpeechAdapter)
        }
    };
    let player: Arc<dyn AudioPlayer> = match config.player_backend {
        PlayerBackend::Command => Arc::new(CommandPlayer::from_command_line(&config.player_command)?),
        #[cfg(feature = "cpal-playback")]
        PlayerBackend::Cpal => Arc::new(reminderd_lib::adapters::CpalPlayer::new()?),
        #[cfg(not(feature = "cpal-playback"))]
        PlayerBackend::Cpal => {
            return Err(DaemonError::Internal(
                "PLAYER_BACKEND=cpal requires building with the cpal-playback feature".to_string(),
            ))
        }
    };
    let surface = TerminalSurface::spawn();

    // --- 4. Wire the Engine ---
    let alerts = AlertController::new(surface, synthesizer, player, config.alert_settings());
    let poller = ReminderPoller::new(store, alerts.clone(), config.poller_settings());

    // --- 5. Poll Until Interrupted ---
    let shutdown = CancellationToken::new();
    let poller_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { poller.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested.");
    shutdown.cancel();
    poller_task
        .await
        .map_err(|e| DaemonError::Internal(format!("Poller task failed: {}", e)))?;
    alerts.dismiss().await;
    info!("Reminder daemon stopped.");

    Ok(())
}
