//! relay-audio: Opus codec cache, VAD, sliding audio buffer, resampling and
//! noise gating for the translation relay.

pub mod buffer;
pub mod codec;
pub mod dsp;
pub mod error;
pub mod resample;
pub mod wav;

pub use buffer::{SlidingAudioBuffer, SlidingBufferConfig};
pub use codec::OpusCodecCache;
pub use dsp::{noise_gate::NoiseGate, noise_gate::NoiseGateConfig, vad::Vad, vad::VadConfig, AudioProcessor};
pub use error::{AudioError, AudioResult};
