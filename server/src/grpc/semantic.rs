//! `SemanticService`: transcript indexing and search.

use crate::proto::{
    SaveTranscriptRequest, SaveTranscriptResponse, SearchTranscriptsRequest, SearchTranscriptsResponse,
    TranscriptMatch,
};
use relay_semantic::TranscriptIndexer;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct SemanticServiceImpl {
    indexer: Arc<TranscriptIndexer>,
}

impl SemanticServiceImpl {
    pub fn new(indexer: Arc<TranscriptIndexer>) -> Self {
        Self { indexer }
    }
}

#[tonic::async_trait]
impl crate::proto::semantic_service_server::SemanticService for SemanticServiceImpl {
    async fn save_transcript(
        &self,
        request: Request<SaveTranscriptRequest>,
    ) -> Result<Response<SaveTranscriptResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .indexer
            .save(
                &req.room_id,
                &req.speaker,
                &req.text,
                req.language.as_deref().unwrap_or("en"),
                req.timestamp.unwrap_or(0),
                req.organization_id.as_deref(),
                &req.room_key,
            )
            .await;

        Ok(Response::new(match result {
            Ok(()) => SaveTranscriptResponse {
                success: true,
                message: "saved".into(),
            },
            Err(e) => SaveTranscriptResponse {
                success: false,
                message: e.to_string(),
            },
        }))
    }

    async fn search_transcripts(
        &self,
        request: Request<SearchTranscriptsRequest>,
    ) -> Result<Response<SearchTranscriptsResponse>, Status> {
        let req = request.into_inner();
        let limit = req.limit.unwrap_or(10) as usize;
        let results = self
            .indexer
            .search(&req.query, &req.room_key, req.organization_id.as_deref(), limit)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        let matches = results
            .into_iter()
            .map(|r| TranscriptMatch {
                room_id: r.room_id.unwrap_or_default(),
                text: r.text,
                timestamp: r.timestamp,
                score: r.score,
            })
            .collect();

        Ok(Response::new(SearchTranscriptsResponse { matches }))
    }
}
