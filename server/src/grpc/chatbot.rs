//! `ChatBotService`: answers free-form questions about a room's
//! conversation using transcript context retrieved from the indexer.

use crate::collaborators::Answerer;
use crate::proto::{AskChatBotRequest, AskChatBotResponse};
use relay_semantic::TranscriptIndexer;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use uuid::Uuid;

const SUMMARY_TRIGGERS: [&str; 2] = ["summary", "tóm tắt"];

pub struct ChatBotServiceImpl {
    indexer: Arc<TranscriptIndexer>,
    answerer: Arc<dyn Answerer>,
}

impl ChatBotServiceImpl {
    pub fn new(indexer: Arc<TranscriptIndexer>, answerer: Arc<dyn Answerer>) -> Self {
        Self { indexer, answerer }
    }

    /// Routes summary-shaped questions to a full transcript scroll and
    /// everything else to scored search, returning speaker-prefixed lines
    /// ready to be joined into the answerer prompt.
    async fn context_for(
        &self,
        question: &str,
        room_key: &str,
        organization_id: Option<&str>,
    ) -> relay_semantic::Result<Vec<String>> {
        let lower = question.to_lowercase();
        if SUMMARY_TRIGGERS.iter().any(|t| lower.contains(t)) {
            let lines = self.indexer.get_all(room_key, organization_id).await?;
            Ok(lines.into_iter().map(|l| l.text).collect())
        } else {
            let results = self.indexer.search(question, room_key, organization_id, 10).await?;
            Ok(results.into_iter().map(|r| r.text).collect())
        }
    }
}

#[tonic::async_trait]
impl crate::proto::chat_bot_service_server::ChatBotService for ChatBotServiceImpl {
    async fn ask_chat_bot(
        &self,
        request: Request<AskChatBotRequest>,
    ) -> Result<Response<AskChatBotResponse>, Status> {
        let req = request.into_inner();

        // room_id doubles as the vector store's room_key; the caller is
        // expected to hand us a canonical UUID the same way SaveTranscript
        // does.
        if Uuid::parse_str(&req.room_id).is_err() {
            return Err(Status::invalid_argument("room_id must be a canonical UUID"));
        }

        let context = self
            .context_for(&req.question, &req.room_id, req.organization_id.as_deref())
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        let answer = self
            .answerer
            .answer(&req.question, &context)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(AskChatBotResponse { answer }))
    }
}
