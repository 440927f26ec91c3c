//! Concrete implementations of the black-box ML/vector-store collaborator
//! traits declared in `relay-pipeline` and `relay-semantic`, plus the
//! chatbot's `Answerer` contract. Every adapter here is a thin REST client;
//! none of them embed a model.

pub mod http_ml;
pub mod qdrant;

use async_trait::async_trait;

pub use http_ml::{
    HttpSpeechToText, HttpTextEmbedder, HttpTextToSpeech, HttpTranslator, HttpTranslatorEnglish,
    HttpVoiceEmbedder, JsonClient,
};
pub use qdrant::QdrantVectorStore;

/// Answers a free-form question about a room using retrieved transcript
/// context. Implemented by a call to an external LLM service; prompt
/// construction is this trait's responsibility, not `relay-semantic`'s.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str, context: &[String]) -> anyhow::Result<String>;
}

pub struct HttpAnswerer {
    client: JsonClient,
}

impl HttpAnswerer {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(serde::Serialize)]
struct AnswerRequest<'a> {
    question: &'a str,
    context: &'a [String],
}

#[derive(serde::Deserialize)]
struct AnswerResponse {
    answer: String,
}

#[async_trait]
impl Answerer for HttpAnswerer {
    async fn answer(&self, question: &str, context: &[String]) -> anyhow::Result<String> {
        let response: AnswerResponse = self
            .client
            .post_json(&AnswerRequest { question, context })
            .await?;
        Ok(response.answer)
    }
}
