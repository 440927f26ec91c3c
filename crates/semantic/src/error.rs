use thiserror::Error;

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("room_key is required and must be a canonical UUID, got: {0:?}")]
    InvalidRoomKey(Option<String>),

    #[error("vector store operation failed: {0}")]
    Store(String),

    #[error("embedding failed: {0}")]
    Embed(String),

    #[error("translation failed: {0}")]
    Translate(String),
}

pub type Result<T> = std::result::Result<T, SemanticError>;
