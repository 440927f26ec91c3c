//! Sliding audio buffer ("hybrid chunk buffer").
//!
//! Accumulates mono 16kHz/16-bit PCM and emits fixed-duration, overlapping
//! windows once an initial warm-up amount has buffered. Each input byte is
//! processed in amortized O(1): the buffer compacts its processed prefix
//! periodically instead of on every emitted window.

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SlidingBufferConfig {
    pub init_buffer_secs: f32,
    pub window_duration_secs: f32,
    pub step_duration_secs: f32,
    pub sample_rate: u32,
}

impl Default for SlidingBufferConfig {
    fn default() -> Self {
        Self {
            init_buffer_secs: 2.0,
            window_duration_secs: 1.0,
            step_duration_secs: 0.7,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

fn secs_to_bytes(secs: f32, sample_rate: u32) -> usize {
    (secs * sample_rate as f32) as usize * BYTES_PER_SAMPLE
}

pub struct SlidingAudioBuffer {
    buffer: Vec<u8>,
    next_start: usize,
    started: bool,
    window_bytes: usize,
    step_bytes: usize,
    init_bytes: usize,
}

impl SlidingAudioBuffer {
    pub fn new(config: SlidingBufferConfig) -> Self {
        Self {
            buffer: Vec::new(),
            next_start: 0,
            started: false,
            window_bytes: secs_to_bytes(config.window_duration_secs, config.sample_rate),
            step_bytes: secs_to_bytes(config.step_duration_secs, config.sample_rate),
            init_bytes: secs_to_bytes(config.init_buffer_secs, config.sample_rate),
        }
    }

    /// Appends `chunk` (raw PCM bytes) and returns a window if one became
    /// ready. At most one window is emitted per call even if more than one
    /// step's worth of audio arrived at once; the remainder is picked up on
    /// the next call.
    pub fn add_audio_chunk(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if chunk.is_empty() {
            return None;
        }

        self.buffer.extend_from_slice(chunk);

        if !self.started {
            if self.buffer.len() >= self.init_bytes {
                self.started = true;
            } else {
                return None;
            }
        }

        if self.buffer.len() - self.next_start >= self.window_bytes {
            let start = self.next_start;
            let end = start + self.window_bytes;
            let window = self.buffer[start..end].to_vec();
            self.next_start += self.step_bytes;

            if self.next_start >= self.step_bytes * 4 {
                self.buffer.drain(0..self.next_start);
                self.next_start = 0;
            }

            return Some(window);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(bytes: usize) -> Vec<u8> {
        vec![0u8; bytes]
    }

    #[test]
    fn no_window_before_init_buffer_fills() {
        let config = SlidingBufferConfig::default();
        let mut buf = SlidingAudioBuffer::new(config);
        let almost_init = secs_to_bytes(config.init_buffer_secs, config.sample_rate) - 100;
        assert!(buf.add_audio_chunk(&silence(almost_init)).is_none());
    }

    #[test]
    fn first_window_has_exact_duration_once_warmed_up() {
        let config = SlidingBufferConfig::default();
        let mut buf = SlidingAudioBuffer::new(config);
        let init_bytes = secs_to_bytes(config.init_buffer_secs, config.sample_rate);
        let window = buf.add_audio_chunk(&silence(init_bytes)).unwrap();
        assert_eq!(window.len(), secs_to_bytes(config.window_duration_secs, config.sample_rate));
    }

    #[test]
    fn subsequent_windows_emit_every_step_duration() {
        let config = SlidingBufferConfig::default();
        let mut buf = SlidingAudioBuffer::new(config);
        let init_bytes = secs_to_bytes(config.init_buffer_secs, config.sample_rate);
        let step_bytes = secs_to_bytes(config.step_duration_secs, config.sample_rate);

        assert!(buf.add_audio_chunk(&silence(init_bytes)).is_some());

        // Less than one step: no new window yet.
        assert!(buf.add_audio_chunk(&silence(step_bytes - 10)).is_none());
        // Crossing the step boundary: exactly one new window.
        assert!(buf.add_audio_chunk(&silence(10)).is_some());
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut buf = SlidingAudioBuffer::new(SlidingBufferConfig::default());
        assert!(buf.add_audio_chunk(&[]).is_none());
    }

    #[test]
    fn buffer_compacts_after_four_steps() {
        let config = SlidingBufferConfig {
            init_buffer_secs: 0.1,
            window_duration_secs: 0.05,
            step_duration_secs: 0.02,
            sample_rate: 1000,
        };
        let mut buf = SlidingAudioBuffer::new(config);
        let init_bytes = secs_to_bytes(config.init_buffer_secs, config.sample_rate);
        let step_bytes = secs_to_bytes(config.step_duration_secs, config.sample_rate);

        buf.add_audio_chunk(&silence(init_bytes));
        for _ in 0..6 {
            buf.add_audio_chunk(&silence(step_bytes));
        }

        assert!(buf.next_start < step_bytes * 4);
    }
}
