//! Sample-rate conversion, channel mixing and frame-alignment padding.
//!
//! The relay moves audio between three rates/layouts: 48kHz stereo (RTP/
//! Opus), 16kHz mono (STT input), and whatever rate TTS hands back before
//! it is upsampled to 48kHz stereo for re-emission.

use crate::error::{AudioError, AudioResult};
use rubato::{FftFixedIn, Resampler};

pub const OPUS_FRAME_SAMPLES_PER_CHANNEL: usize = 960;

pub fn downmix_stereo_to_mono(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks_exact(2)
        .map(|pair| (((pair[0] as i32) + (pair[1] as i32)) / 2) as i16)
        .collect()
}

pub fn upmix_mono_to_stereo(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.push(s);
        out.push(s);
    }
    out
}

fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
}

fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Resamples a single-channel f32 stream from `from_rate` to `to_rate`.
pub fn resample_mono(input: &[f32], from_rate: u32, to_rate: u32) -> AudioResult<Vec<f32>> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let chunk_size = input.len();
    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 1, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let waves_in = vec![input.to_vec()];
    let waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    Ok(waves_out.into_iter().next().unwrap_or_default())
}

/// 48kHz stereo -> 16kHz mono, the shape the STT step expects.
pub fn downsample_48k_stereo_to_16k_mono(pcm: &[i16]) -> AudioResult<Vec<i16>> {
    let mono = downmix_stereo_to_mono(pcm);
    let as_f32 = i16_to_f32(&mono);
    let resampled = resample_mono(&as_f32, 48_000, 16_000)?;
    Ok(f32_to_i16(&resampled))
}

/// Mono PCM at `source_rate` -> 48kHz stereo, the shape the RTP emitter
/// expects, with opus-frame alignment padding applied.
pub fn upsample_to_48k_stereo(pcm: &[i16], source_rate: u32) -> AudioResult<Vec<i16>> {
    let mono_48k = if source_rate == 48_000 {
        pcm.to_vec()
    } else {
        let as_f32 = i16_to_f32(pcm);
        let resampled = resample_mono(&as_f32, source_rate, 48_000)?;
        f32_to_i16(&resampled)
    };

    let mut stereo = upmix_mono_to_stereo(&mono_48k);
    pad_to_frame_alignment(&mut stereo, 2, OPUS_FRAME_SAMPLES_PER_CHANNEL);
    Ok(stereo)
}

/// Pads `samples` (interleaved, `channels` channels) up to the next
/// multiple of `frame_samples_per_channel` frames. If the gap is at most
/// 480 frames (10ms @ 48kHz), the tail is linearly faded to silence and
/// then held there, avoiding an audible click; longer gaps are zero-padded
/// since a fade that long would itself be audible.
pub fn pad_to_frame_alignment(samples: &mut Vec<i16>, channels: usize, frame_samples_per_channel: usize) {
    if channels == 0 || samples.is_empty() {
        return;
    }
    let current_frames = samples.len() / channels;
    let remainder = current_frames % frame_samples_per_channel;
    if remainder == 0 {
        return;
    }
    let pad_frames = frame_samples_per_channel - remainder;
    pad_with_fade_or_silence(samples, channels, pad_frames);
}

fn pad_with_fade_or_silence(samples: &mut Vec<i16>, channels: usize, pad_frames: usize) {
    const MAX_FADE_FRAMES: usize = 480;
    let current_frames = samples.len() / channels;

    if pad_frames > MAX_FADE_FRAMES || current_frames == 0 {
        samples.resize(samples.len() + pad_frames * channels, 0);
        return;
    }

    let fade_frames = current_frames.min(MAX_FADE_FRAMES);
    let start = current_frames - fade_frames;
    for i in 0..fade_frames {
        let gain = 1.0 - (i as f32 + 1.0) / fade_frames as f32;
        for c in 0..channels {
            let idx = (start + i) * channels + c;
            samples[idx] = (f32::from(samples[idx]) * gain) as i16;
        }
    }

    let last_frame: Vec<i16> = (0..channels)
        .map(|c| samples[(current_frames - 1) * channels + c])
        .collect();
    for _ in 0..pad_frames {
        samples.extend_from_slice(&last_frame);
    }
}
