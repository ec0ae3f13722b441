//! services/reminderd/src/adapters/surface.rs
//!
//! A terminal implementation of the `AlertSurface` port: alerts are printed as
//! a banner and pressing Enter dismisses the current one.

use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use reminder_core::ports::{AlertSurface, DismissSignal, PortResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct TerminalSurface {
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl TerminalSurface {
    /// Creates the surface and starts listening for Enter on stdin.
    pub fn spawn() -> Arc<Self> {
        Self::spawn_with_input(BufReader::new(tokio::io::stdin()))
    }

    /// Same as [`TerminalSurface::spawn`] but reads dismissals from `input`.
    pub fn spawn_with_input<R>(input: R) -> Arc<Self>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let surface = Arc::new(Self {
            pending: Mutex::new(None),
        });

        let listener = surface.clone();
        tokio::spawn(async move {
            let mut lines = input.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(_)) => listener.dismiss_current().await,
                    Ok(None) => {
                        warn!("Input closed; alerts can no longer be dismissed from the terminal.");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read terminal input: {}", e);
                        break;
                    }
                }
            }
        });

        surface
    }

    async fn dismiss_current(&self) {
        if let Some(sender) = self.pending.lock().await.take() {
            let _ = sender.send(());
        }
    }
}

#[async_trait]
impl AlertSurface for TerminalSurface {
    async fn show_alert(&self, text: &str) -> PortResult<DismissSignal> {
        let (sender, signal) = oneshot::channel();
        *self.pending.lock().await = Some(sender);

        let rule = "=".repeat(text.chars().count().clamp(20, 72) + 4);
        println!("\n{rule}\n  REMINDER: {text}\n  (press Enter to dismiss)\n{rule}\n");
        info!("Alert shown.");
        Ok(signal)
    }

    async fn hide_alert(&self) -> PortResult<()> {
        if self.pending.lock().await.take().is_some() {
            println!("Reminder dismissed.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn enter_dismisses_the_current_alert() {
        let (mut keyboard, input) = tokio::io::duplex(64);
        let surface = TerminalSurface::spawn_with_input(BufReader::new(input));

        let signal = surface.show_alert("drink water").await.unwrap();
        keyboard.write_all(b"\n").await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), signal).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn closed_input_leaves_alerts_pending() {
        let (keyboard, input) = tokio::io::duplex(64);
        let surface = TerminalSurface::spawn_with_input(BufReader::new(input));
        drop(keyboard);

        let signal = surface.show_alert("drink water").await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(100), signal).await;
        assert!(result.is_err(), "alert should still be waiting");
    }

    #[tokio::test]
    async fn hide_drops_the_pending_sender() {
        let (_keyboard, input) = tokio::io::duplex(64);
        let surface = TerminalSurface::spawn_with_input(BufReader::new(input));

        let signal = surface.show_alert("stand up").await.unwrap();
        surface.hide_alert().await.unwrap();
        assert!(signal.await.is_err());
    }
}
