//! Opus codec cache.
//!
//! One encoder and one decoder per cabin, constructed lazily on first use
//! and kept for the cabin's lifetime. Fixed at 48kHz stereo, the Opus
//! "Audio" application profile, 128kbit/s.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use parking_lot::Mutex;
use relay_core::CabinKey;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

pub const SAMPLE_RATE: SampleRate = SampleRate::Hz48000;
pub const CHANNELS: Channels = Channels::Stereo;
pub const BITRATE_BPS: i32 = 128_000;

const FRAME_SIZE_20MS: usize = 960;
const STEREO_FRAME_SAMPLES: usize = FRAME_SIZE_20MS * 2;

/// Frame sizes tried in order when decoding fails at the default 20ms
/// size: 10ms, 40ms, 60ms, matching the codec's valid frame durations.
const DECODE_FALLBACK_FRAME_SIZES: [usize; 3] = [480, 1920, 2880];

struct CodecEntry {
    encoder: Option<Encoder>,
    decoder: Option<Decoder>,
}

/// Per-cabin Opus encoder/decoder cache.
pub struct OpusCodecCache {
    entries: Mutex<HashMap<CabinKey, Arc<Mutex<CodecEntry>>>>,
}

impl Default for OpusCodecCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OpusCodecCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, cabin_key: &CabinKey) -> Arc<Mutex<CodecEntry>> {
        let mut entries = self.entries.lock();
        entries
            .entry(cabin_key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CodecEntry {
                    encoder: None,
                    decoder: None,
                }))
            })
            .clone()
    }

    /// Encodes one 20ms stereo frame (3840 bytes / 1920 i16 samples). If
    /// fewer samples are provided they are zero-padded to one frame; if
    /// more are provided only the first frame is encoded.
    pub fn encode(&self, cabin_key: &CabinKey, pcm: &[i16]) -> AudioResult<Vec<u8>> {
        let entry = self.entry(cabin_key);
        let mut entry = entry.lock();

        if entry.encoder.is_none() {
            entry.encoder = Some(new_encoder()?);
        }
        let encoder = entry.encoder.as_mut().unwrap();

        let mut frame = vec![0i16; STEREO_FRAME_SAMPLES];
        let copy_len = pcm.len().min(STEREO_FRAME_SAMPLES);
        frame[..copy_len].copy_from_slice(&pcm[..copy_len]);

        let mut output = vec![0u8; 4000];
        let written = encoder
            .encode(&frame, &mut output)
            .map_err(|e| AudioError::Codec(e.to_string()))?;
        output.truncate(written);
        Ok(output)
    }

    /// Decodes an Opus payload to interleaved stereo i16 PCM. Tries the
    /// default 20ms frame size first, then 10/40/60ms on failure, and
    /// returns an empty vector (dropping the packet) if every size fails.
    /// Rejects payloads shorter than 3 bytes or longer than 1276 bytes
    /// without invoking the decoder, matching Opus's valid payload range.
    pub fn decode(&self, cabin_key: &CabinKey, payload: &[u8]) -> AudioResult<Vec<i16>> {
        if payload.len() < 3 || payload.len() > 1276 {
            return Ok(Vec::new());
        }

        let entry = self.entry(cabin_key);
        let mut entry = entry.lock();
        if entry.decoder.is_none() {
            entry.decoder = Some(new_decoder()?);
        }
        let decoder = entry.decoder.as_mut().unwrap();

        for &frame_size in std::iter::once(&FRAME_SIZE_20MS).chain(DECODE_FALLBACK_FRAME_SIZES.iter()) {
            let mut output = vec![0i16; frame_size * 2];
            match decoder.decode(Some(payload), &mut output, false) {
                Ok(decoded_per_channel) => {
                    output.truncate(decoded_per_channel * 2);
                    return Ok(output);
                }
                Err(e) => {
                    debug!(frame_size, error = %e, "opus decode attempt failed, trying next frame size");
                }
            }
        }

        warn!(cabin = %cabin_key, "opus decode failed at all frame sizes, dropping packet");
        Ok(Vec::new())
    }

    pub fn cleanup(&self, cabin_key: &CabinKey) {
        self.entries.lock().remove(cabin_key);
    }
}

fn new_encoder() -> AudioResult<Encoder> {
    let mut encoder = Encoder::new(SAMPLE_RATE, CHANNELS, Application::Audio)
        .map_err(|e| AudioError::Codec(e.to_string()))?;
    encoder
        .set_bitrate(audiopus::Bitrate::BitsPerSecond(BITRATE_BPS))
        .map_err(|e| AudioError::Codec(e.to_string()))?;
    Ok(encoder)
}

fn new_decoder() -> AudioResult<Decoder> {
    Decoder::new(SAMPLE_RATE, CHANNELS).map_err(|e| AudioError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{LanguageCode, RoomId, SpeakerId};

    fn key() -> CabinKey {
        CabinKey::new(
            RoomId::new("R1"),
            SpeakerId::new("U1"),
            LanguageCode::new("vi"),
            LanguageCode::new("en"),
        )
    }

    #[test]
    fn encode_then_decode_round_trips_within_tolerance() {
        let cache = OpusCodecCache::new();
        let k = key();
        let pcm: Vec<i16> = (0..STEREO_FRAME_SAMPLES)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let encoded = cache.encode(&k, &pcm).unwrap();
        assert!(!encoded.is_empty());
        let decoded = cache.decode(&k, &encoded).unwrap();
        assert_eq!(decoded.len(), STEREO_FRAME_SAMPLES);
    }

    #[test]
    fn encode_pads_short_input_to_one_frame() {
        let cache = OpusCodecCache::new();
        let k = key();
        let short_pcm = vec![1000i16; 100];
        let encoded = cache.encode(&k, &short_pcm).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn decode_rejects_undersized_payload_without_calling_decoder() {
        let cache = OpusCodecCache::new();
        let k = key();
        let decoded = cache.decode(&k, &[1, 2]).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn decode_garbage_payload_returns_empty_instead_of_erroring() {
        let cache = OpusCodecCache::new();
        let k = key();
        let garbage = vec![0xFFu8; 50];
        let decoded = cache.decode(&k, &garbage).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn cleanup_drops_cached_codec_state() {
        let cache = OpusCodecCache::new();
        let k = key();
        let pcm = vec![0i16; STEREO_FRAME_SAMPLES];
        cache.encode(&k, &pcm).unwrap();
        assert!(cache.entries.lock().contains_key(&k));
        cache.cleanup(&k);
        assert!(!cache.entries.lock().contains_key(&k));
    }
}
