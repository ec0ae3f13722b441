//! services/reminderd/src/adapters/speaker.rs
//!
//! In-process playback of announcement clips on the default output device via
//! cpal. Implements the `AudioPlayer` port. Only built with the
//! `cpal-playback` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use reminder_core::domain::Clip;
use reminder_core::ports::{AudioPlayer, PortError, PortResult};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Mono or interleaved samples decoded from a clip.
#[derive(Debug)]
struct Pcm {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

/// An `AudioPlayer` that renders clips through cpal on a dedicated thread.
#[derive(Default)]
pub struct CpalPlayer {
    /// Stop flag of the playback currently rendering, if any.
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl CpalPlayer {
    /// Fails when the host has no output device.
    pub fn new() -> PortResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PortError::Unexpected("no default output device".to_string()))?;
        let name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        debug!("using output device: {name}");
        Ok(Self::default())
    }

    fn swap_current(&self, next: Option<Arc<AtomicBool>>) -> PortResult<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| PortError::Unexpected(format!("playback state lock poisoned: {e}")))?;
        if let Some(stopped) = current.take() {
            stopped.store(true, Ordering::SeqCst);
        }
        *current = next;
        Ok(())
    }
}

#[async_trait]
impl AudioPlayer for CpalPlayer {
    async fn play(&self, clip: &Clip) -> PortResult<()> {
        let pcm = decode_wav(&clip.audio)?;
        let stopped = Arc::new(AtomicBool::new(false));
        self.swap_current(Some(stopped.clone()))?;

        let (started_tx, started_rx) = oneshot::channel();
        std::thread::spawn(move || render(pcm, stopped, started_tx));

        started_rx
            .await
            .map_err(|_| PortError::Unexpected("playback thread exited early".to_string()))?
    }

    async fn stop(&self) -> PortResult<()> {
        self.swap_current(None)
    }
}

/// Runs one clip to completion or until `stopped` is set. The stream is built
/// here because cpal streams cannot move between threads on every platform.
fn render(pcm: Pcm, stopped: Arc<AtomicBool>, started: oneshot::Sender<PortResult<()>>) {
    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: pcm.samples,
        position: 0,
        finished: false,
    }));

    let stream = match open_stream(pcm.channels, pcm.sample_rate, buffer.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };
    let _ = started.send(Ok(()));

    loop {
        std::thread::sleep(Duration::from_millis(10));
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        match buffer.lock() {
            Ok(buf) if buf.finished => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    drop(stream);
}

fn open_stream(
    channels: u16,
    sample_rate: u32,
    buffer: Arc<Mutex<PlaybackBuffer>>,
) -> PortResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PortError::Unexpected("no default output device".to_string()))?;

    let stream_config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| PortError::Unexpected(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| PortError::Unexpected(format!("failed to start output stream: {e}")))?;
    Ok(stream)
}

/// Decodes a 16-bit integer WAV clip into normalised float samples.
fn decode_wav(audio: &[u8]) -> PortResult<Pcm> {
    let reader = hound::WavReader::new(std::io::Cursor::new(audio))
        .map_err(|e| PortError::InvalidInput(format!("clip is not a WAV file: {e}")))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(PortError::InvalidInput(format!(
            "unsupported WAV format: {:?} {} bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PortError::InvalidInput(format!("corrupt WAV data: {e}")))?;

    Ok(Pcm {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tts::pcm16_clip;

    #[test]
    fn decodes_synthesized_clips() {
        let pcm: Vec<u8> = [0i16, i16::MAX, -i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let clip = pcm16_clip(&pcm, 24_000).unwrap();

        let decoded = decode_wav(&clip.audio).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.samples, vec![0.0, 1.0, -1.0]);
    }

    #[test]
    fn rejects_non_wav_audio() {
        assert!(matches!(decode_wav(b"not audio"), Err(PortError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn stop_without_playback_is_a_no_op() {
        let player = CpalPlayer::default();
        player.stop().await.unwrap();
        player.stop().await.unwrap();
    }
}
