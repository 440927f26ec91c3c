//! relay-pipeline: STT/NMT/TTS collaborator contracts, the translation
//! pipeline that drives them, and the voice clone store that supplies
//! per-speaker voice embeddings to TTS.

pub mod collaborators;
pub mod error;
pub mod pipeline;
pub mod voice_clone;

pub use collaborators::{SpeechToText, SynthesizedAudio, TextToSpeech, Translator, VoiceEmbedder};
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineCache, PipelineOutcome, TranslationPipeline};
pub use voice_clone::{VoiceCloneConfig, VoiceCloneStore};
