//! services/reminderd/src/adapters/player.rs
//!
//! Plays announcement clips by handing a WAV file to an external player
//! program (`aplay`, `afplay`, ...). Implements the `AudioPlayer` port.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use reminder_core::domain::Clip;
use reminder_core::ports::{AudioPlayer, PortError, PortResult};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

/// An `AudioPlayer` that spawns one player process per playback.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    clip_path: PathBuf,
    child: Mutex<Option<Child>>,
}

impl CommandPlayer {
    /// Builds a player from a command line such as `"aplay -q"`. The clip path
    /// is appended as the final argument.
    pub fn from_command_line(command: &str) -> PortResult<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PortError::InvalidInput("Player command is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn new(program: String, args: Vec<String>) -> Self {
        let clip_path =
            std::env::temp_dir().join(format!("reminderd-{}-announcement.wav", std::process::id()));
        Self {
            program,
            args,
            clip_path,
            child: Mutex::new(None),
        }
    }

    /// Whether a previously started player process is still running.
    pub async fn is_playing(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(process) => matches!(process.try_wait(), Ok(None)),
            None => false,
        }
    }
}

async fn kill(child: &mut Option<Child>) -> PortResult<()> {
    if let Some(mut process) = child.take() {
        if let Ok(None) = process.try_wait() {
            process
                .kill()
                .await
                .map_err(|e| PortError::Unexpected(format!("Failed to stop player: {}", e)))?;
        }
    }
    Ok(())
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, clip: &Clip) -> PortResult<()> {
        let mut child = self.child.lock().await;
        kill(&mut child).await?;

        tokio::fs::write(&self.clip_path, &clip.audio)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write clip: {}", e)))?;

        let process = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.clip_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PortError::Unexpected(format!("Failed to start player '{}': {}", self.program, e))
            })?;
        debug!(program = %self.program, pid = ?process.id(), "Player started.");

        *child = Some(process);
        Ok(())
    }

    async fn stop(&self) -> PortResult<()> {
        let mut child = self.child.lock().await;
        kill(&mut child).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn clip() -> Clip {
        Clip {
            audio: Bytes::from_static(b"RIFF"),
            duration: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn stop_kills_a_running_player() {
        let player = CommandPlayer::new("sh".to_string(), vec!["-c".to_string(), "sleep 5".to_string()]);
        player.play(&clip()).await.unwrap();
        assert!(player.is_playing().await);

        player.stop().await.unwrap();
        assert!(!player.is_playing().await);
    }

    #[tokio::test]
    async fn stop_without_playback_is_a_no_op() {
        let player = CommandPlayer::from_command_line("true").unwrap();
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let player = CommandPlayer::new("definitely-not-a-player-binary".to_string(), Vec::new());
        assert!(player.play(&clip()).await.is_err());
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandPlayer::from_command_line("   ").is_err());
    }
}
