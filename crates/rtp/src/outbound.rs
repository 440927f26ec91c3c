//! Per-cabin outbound RTP state: a monotonically advancing sequence number
//! and timestamp, seeded once and then stepped one 20ms Opus frame at a
//! time (960 samples at the 48kHz clock).

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CLOCK_RATE: u32 = 48_000;
pub const SAMPLES_PER_FRAME: u32 = 960;

#[derive(Debug, Clone, Copy)]
pub struct OutboundRtpState {
    sequence: u16,
    timestamp: u32,
}

impl OutboundRtpState {
    /// Seeds sequence randomly and timestamp from wall-clock, matching the
    /// upstream's practice of starting each cabin's outbound stream at an
    /// unpredictable offset rather than zero.
    pub fn new() -> Self {
        let sequence = rand::thread_rng().gen::<u16>();
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let timestamp = (now_secs.wrapping_mul(u64::from(CLOCK_RATE)) & u64::from(u32::MAX)) as u32;
        Self { sequence, timestamp }
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Advances state by one 20ms frame and returns the (sequence,
    /// timestamp) pair to stamp the packet carrying that frame with.
    pub fn next_frame(&mut self) -> (u16, u32) {
        let pair = (self.sequence, self.timestamp);
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(SAMPLES_PER_FRAME);
        pair
    }
}

impl Default for OutboundRtpState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_frame_advances_sequence_by_one() {
        let mut state = OutboundRtpState::new();
        let (seq0, _) = state.next_frame();
        let (seq1, _) = state.next_frame();
        assert_eq!(seq1, seq0.wrapping_add(1));
    }

    #[test]
    fn next_frame_advances_timestamp_by_samples_per_frame() {
        let mut state = OutboundRtpState::new();
        let (_, ts0) = state.next_frame();
        let (_, ts1) = state.next_frame();
        assert_eq!(ts1, ts0.wrapping_add(SAMPLES_PER_FRAME));
    }

    #[test]
    fn sequence_wraps_at_u16_boundary() {
        let mut state = OutboundRtpState {
            sequence: u16::MAX,
            timestamp: 0,
        };
        let (seq, _) = state.next_frame();
        assert_eq!(seq, u16::MAX);
        assert_eq!(state.sequence(), 0);
    }

    #[test]
    fn monotonic_over_k_frames() {
        let mut state = OutboundRtpState::new();
        let (seq0, ts0) = state.next_frame();
        for k in 1..10u32 {
            let (seq, ts) = state.next_frame();
            assert_eq!(seq, seq0.wrapping_add(k as u16));
            assert_eq!(ts, ts0.wrapping_add(SAMPLES_PER_FRAME * k));
        }
    }
}
