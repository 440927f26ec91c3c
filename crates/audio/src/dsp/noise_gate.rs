//! Noise gate for emitted audio.
//!
//! Builds a binary above-threshold mask per output frame and dilates it so
//! that a short loud passage doesn't get truncated at its edges, then
//! silences every frame the dilated mask rejects. This is deliberately not
//! the smooth attack/release gate used for live capture: the input here is
//! already a finished utterance, so there is no benefit to gradual gain
//! ramping, only to not clipping onsets/offsets.

use super::AudioProcessor;

#[derive(Debug, Clone)]
pub struct NoiseGateConfig {
    /// Per-frame amplitude below which a frame is considered silent.
    pub threshold: i16,
    /// Number of interleaved frames (±) around an above-threshold frame
    /// that are kept open. 480 frames at 48kHz is 10ms, matching the
    /// hangover granularity used elsewhere in the relay.
    pub dilation_frames: usize,
    pub channels: usize,
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self {
            threshold: 500,
            dilation_frames: 480,
            channels: 2,
        }
    }
}

pub struct NoiseGate {
    config: NoiseGateConfig,
    enabled: bool,
}

impl NoiseGate {
    pub fn new(config: NoiseGateConfig) -> Self {
        Self { config, enabled: true }
    }

    /// Returns the dilated per-frame mask without mutating `samples`, handy
    /// for tests and for callers that want to inspect gating decisions.
    pub fn mask(&self, samples: &[i16]) -> Vec<bool> {
        let channels = self.config.channels.max(1);
        let num_frames = samples.len() / channels;
        let mut raw = vec![false; num_frames];
        for (frame_idx, frame) in samples.chunks(channels).enumerate() {
            if frame_idx >= num_frames {
                break;
            }
            let peak = frame.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
            raw[frame_idx] = peak as i32 > i32::from(self.config.threshold);
        }
        dilate(&raw, self.config.dilation_frames)
    }
}

impl AudioProcessor for NoiseGate {
    fn process(&mut self, samples: &mut [i16]) {
        if !self.enabled {
            return;
        }
        let channels = self.config.channels.max(1);
        let mask = self.mask(samples);
        for (frame_idx, frame) in samples.chunks_mut(channels).enumerate() {
            if !mask.get(frame_idx).copied().unwrap_or(false) {
                for sample in frame.iter_mut() {
                    *sample = 0;
                }
            }
        }
    }

    fn reset(&mut self) {}

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

fn dilate(mask: &[bool], radius: usize) -> Vec<bool> {
    if radius == 0 {
        return mask.to_vec();
    }
    let mut out = vec![false; mask.len()];
    let mut next_open_until: Option<usize> = None;
    for i in 0..mask.len() {
        if mask[i] {
            next_open_until = Some(i + radius);
        }
        let held_open = next_open_until.is_some_and(|until| i <= until);
        let look_ahead = mask[i..(i + radius + 1).min(mask.len())].iter().any(|&v| v);
        out[i] = held_open || look_ahead;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_signal_is_fully_gated() {
        let mut gate = NoiseGate::new(NoiseGateConfig { channels: 1, ..Default::default() });
        let mut samples = vec![10i16; 2000];
        gate.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn loud_signal_passes_through() {
        let mut gate = NoiseGate::new(NoiseGateConfig { channels: 1, ..Default::default() });
        let mut samples = vec![5000i16; 2000];
        gate.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 5000));
    }

    #[test]
    fn dilation_keeps_neighborhood_of_loud_frame_open() {
        let config = NoiseGateConfig { channels: 1, dilation_frames: 5, threshold: 500 };
        let gate = NoiseGate::new(config);
        let mut samples = vec![10i16; 21];
        samples[10] = 5000;
        let mask = gate.mask(&samples);
        for i in 5..=15 {
            assert!(mask[i], "frame {} should be held open by dilation", i);
        }
        assert!(!mask[0]);
        assert!(!mask[20]);
    }

    #[test]
    fn disabled_gate_passes_everything_unchanged() {
        let mut gate = NoiseGate::new(NoiseGateConfig::default());
        gate.set_enabled(false);
        let original = vec![1i16, 2, 3, 4];
        let mut samples = original.clone();
        gate.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn stereo_frame_uses_max_channel_peak() {
        let config = NoiseGateConfig { channels: 2, threshold: 500, dilation_frames: 0 };
        let gate = NoiseGate::new(config);
        // frame 0: L quiet, R loud -> should stay open
        let samples = vec![10i16, 5000, 10, 10];
        let mask = gate.mask(&samples);
        assert!(mask[0]);
        assert!(!mask[1]);
    }
}
