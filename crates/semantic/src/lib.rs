//! relay-semantic: transcript vector indexing and search behind a narrow
//! `VectorStore` trait. The chatbot's summary-vs-search routing and prompt
//! assembly live at the gRPC dispatcher layer, above this crate.

pub mod error;
pub mod indexer;

pub use error::{Result, SemanticError};
pub use indexer::{
    Point, ScoredPoint, SearchResult, TextEmbedder, TranscriptIndexer, TranscriptLine, TranscriptPayload, Translator,
    VectorStore,
};
