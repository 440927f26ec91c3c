//! Error types for the audio crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resampling error: {0}")]
    Resample(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
