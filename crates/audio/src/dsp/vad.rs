//! Voice Activity Detection.
//!
//! Combines a frame-level speech/non-speech classifier with a whole-window
//! energy gate and a time-based hangover, so a single dropped syllable
//! inside an otherwise-speaking window doesn't flip the gate. Operates on
//! 16kHz mono PCM.

use super::AudioProcessor;
use std::time::{Duration, Instant};

pub const SAMPLE_RATE_HZ: u32 = 16_000;
const FRAME_DURATION_MS: u32 = 20;
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE_HZ as usize * FRAME_DURATION_MS as usize) / 1000; // 320

#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Mean absolute amplitude a window must exceed to ever be speech.
    pub energy_threshold: f32,
    /// How long after the last confirmed speech frame a silent window is
    /// still reported as speech (hangover), to avoid clipping word tails.
    pub silence_duration: Duration,
    /// Fraction of 20ms frames within a window that must classify as
    /// speech for the window to be confirmed as speech.
    pub min_speech_ratio: f32,
    /// 0 (permissive) ..= 3 (strict), mirrors the aggressiveness knob of
    /// frame-level speech classifiers: higher values raise both the energy
    /// and zero-crossing-rate bars a frame must clear.
    pub aggressiveness: u8,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 200.0,
            silence_duration: Duration::from_millis(300),
            min_speech_ratio: 0.3,
            aggressiveness: 3,
        }
    }
}

pub struct Vad {
    config: VadConfig,
    last_speech_time: Option<Instant>,
    last_decision: bool,
    enabled: bool,
}

impl Vad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            last_speech_time: None,
            last_decision: false,
            enabled: true,
        }
    }

    pub fn is_voice_active(&self) -> bool {
        self.last_decision
    }

    /// Decides whether `pcm` (16-bit mono samples) contains speech,
    /// updating the hangover clock as a side effect.
    pub fn detect_speech(&mut self, pcm: &[i16]) -> bool {
        if !self.enabled {
            return false;
        }

        let decision = if pcm.len() < FRAME_SAMPLES {
            mean_abs_amplitude(pcm) > self.config.energy_threshold
        } else {
            self.detect_multi_frame(pcm)
        };

        if decision {
            self.last_speech_time = Some(Instant::now());
            self.last_decision = true;
            return true;
        }

        let holding = match self.last_speech_time {
            Some(t) => t.elapsed() < self.config.silence_duration,
            None => false,
        };
        self.last_decision = holding;
        holding
    }

    fn detect_multi_frame(&self, pcm: &[i16]) -> bool {
        let mut total_frames = 0u32;
        let mut speech_frames = 0u32;
        for frame in pcm.chunks_exact(FRAME_SAMPLES) {
            total_frames += 1;
            if frame_is_speech(frame, self.config.aggressiveness) {
                speech_frames += 1;
            }
        }

        if total_frames == 0 {
            return false;
        }

        let ratio = f32::from(speech_frames as u16) / f32::from(total_frames as u16);
        let energy = mean_abs_amplitude(pcm);
        ratio >= self.config.min_speech_ratio && energy > self.config.energy_threshold
    }
}

impl AudioProcessor for Vad {
    fn process(&mut self, samples: &mut [i16]) {
        self.detect_speech(samples);
    }

    fn reset(&mut self) {
        self.last_speech_time = None;
        self.last_decision = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Classifies a single 20ms frame as speech or not-speech using energy and
/// zero-crossing rate, with thresholds scaled by `aggressiveness`.
fn frame_is_speech(frame: &[i16], aggressiveness: u8) -> bool {
    let strictness = 1.0 + f32::from(aggressiveness) * 0.5;
    let energy_bar = 150.0 * strictness;
    let zcr_bar = (0.35 / strictness).max(0.05);

    let energy = mean_abs_amplitude(frame);
    let zcr = zero_crossing_rate(frame);

    energy > energy_bar && zcr < zcr_bar
}

fn mean_abs_amplitude(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s.unsigned_abs())).sum();
    (sum / samples.len() as f64) as f32
}

fn zero_crossing_rate(samples: &[i16]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0) != (w[1] >= 0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}
