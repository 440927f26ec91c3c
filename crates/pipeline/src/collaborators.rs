//! Trait boundaries for the external ML services the pipeline drives.
//! Concrete implementations (gRPC clients to the actual STT/NMT/TTS/
//! embedding services) live outside this crate; everything here only
//! describes the contract.

use crate::error::Result;
use async_trait::async_trait;
use relay_core::{LanguageCode, RoomId, SpeakerId};

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes a WAV-framed audio window. Returns an empty string
    /// (not an error) when no speech was recognized.
    async fn transcribe(&self, wav: &[u8], language: &LanguageCode) -> Result<String>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &LanguageCode, target: &LanguageCode) -> Result<String>;
}

/// Synthesized speech: mono PCM at whatever `sample_rate` the model
/// produces (the caller resamples to 48kHz stereo before emission).
pub struct SynthesizedAudio {
    pub pcm: Vec<i16>,
    pub sample_rate: u32,
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        target: &LanguageCode,
        speaker_id: &SpeakerId,
        room_id: &RoomId,
        voice_embedding: Option<&[f32]>,
    ) -> Result<SynthesizedAudio>;
}

#[async_trait]
pub trait VoiceEmbedder: Send + Sync {
    async fn extract_embedding(&self, pcm: &[i16], sample_rate: u32) -> Result<Vec<f32>>;
}
