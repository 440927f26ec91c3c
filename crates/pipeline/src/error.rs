use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("speech-to-text failed: {0}")]
    Stt(String),

    #[error("translation failed: {0}")]
    Translate(String),

    #[error("text-to-speech failed: {0}")]
    Tts(String),

    #[error("voice embedding extraction failed: {0}")]
    Embedding(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
