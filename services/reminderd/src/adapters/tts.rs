//! services/reminderd/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! It implements the `SpeechSynthesizer` port from the `core` crate.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use async_trait::async_trait;
use bytes::Bytes;
use hound::{WavSpec, WavWriter};
use reminder_core::domain::Clip;
use reminder_core::ports::{PortError, PortResult, SpeechSynthesizer};

/// Sample rate of the raw PCM the speech API returns.
const PCM_SAMPLE_RATE: u32 = 24_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechSynthesizer` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiTtsAdapter {
    /// Creates a new `OpenAiTtsAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }

    /// Maps a configured voice name onto the API's voice enum.
    pub fn parse_voice(name: &str) -> Option<Voice> {
        match name.trim().to_lowercase().as_str() {
            "alloy" => Some(Voice::Alloy),
            "echo" => Some(Voice::Echo),
            "fable" => Some(Voice::Fable),
            "onyx" => Some(Voice::Onyx),
            "nova" => Some(Voice::Nova),
            "shimmer" => Some(Voice::Shimmer),
            _ => None,
        }
    }

    pub fn parse_model(name: &str) -> Option<SpeechModel> {
        match name.trim().to_lowercase().as_str() {
            "tts-1" => Some(SpeechModel::Tts1),
            "tts-1-hd" => Some(SpeechModel::Tts1Hd),
            _ => None,
        }
    }
}

//=========================================================================================
// `SpeechSynthesizer` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechSynthesizer for OpenAiTtsAdapter {
    /// Requests raw PCM so the clip length is known exactly, then wraps it as WAV.
    async fn synthesize(&self, text: &str) -> PortResult<Clip> {
        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            response_format: Some(SpeechResponseFormat::Pcm),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        pcm16_clip(&response.bytes, PCM_SAMPLE_RATE)
    }
}

/// Wraps mono 16-bit little-endian PCM into a WAV clip.
pub fn pcm16_clip(pcm_data: &[u8], sample_rate: u32) -> PortResult<Clip> {
    let samples = pcm_data.len() / 2;
    let audio = pcm16_to_wav(pcm_data, sample_rate)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;
    let duration = Duration::from_secs_f64(samples as f64 / f64::from(sample_rate));
    Ok(Clip {
        audio: Bytes::from(audio),
        duration,
    })
}

fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in pcm_data.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(cursor.into_inner())
}

//=========================================================================================
// Muted Adapter
//=========================================================================================

/// Used when no speech backend is configured; every alert is visual only.
#[derive(Clone, Default)]
pub struct MutedSpeechAdapter;

#[async_trait]
impl SpeechSynthesizer for MutedSpeechAdapter {
    async fn synthesize(&self, _text: &str) -> PortResult<Clip> {
        Err(PortError::Unexpected(
            "Speech synthesis is disabled (no OPENAI_API_KEY)".to_string(),
        ))
    }
}
