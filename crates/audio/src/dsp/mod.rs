//! DSP building blocks for the translation relay.
//!
//! All modules implement `AudioProcessor` for uniform pipeline integration.
//! Unlike a general-purpose audio engine this relay never touches a sound
//! card, so the processors operate directly on signed 16-bit PCM rather
//! than normalized f32 samples.

pub mod noise_gate;
pub mod vad;

/// Common trait for in-place audio processors operating on 16-bit PCM.
pub trait AudioProcessor: Send + Sync {
    fn process(&mut self, samples: &mut [i16]);
    fn reset(&mut self);
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
}
