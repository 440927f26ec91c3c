//! Transcript vector indexing: saves a transcript line under its original
//! language, then republishes an English-translated vector for cross-
//! language search. Reached through a narrow `VectorStore` trait so the
//! concrete Qdrant client lives outside this crate entirely.

use crate::error::{Result, SemanticError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const SEARCH_SCORE_THRESHOLD: f32 = 0.60;
const SCROLL_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct TranscriptPayload {
    pub original_text: String,
    pub original_language: String,
    pub room_id: String,
    pub room_key: String,
    pub speaker: String,
    pub timestamp: i64,
    pub organization_id: Option<String>,
    pub english_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: TranscriptPayload,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: TranscriptPayload,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub text: String,
    pub room_id: Option<String>,
    pub timestamp: i64,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub text: String,
    pub speaker: String,
    pub timestamp: i64,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, point: Point) -> Result<()>;
    async fn update_vector(&self, point_id: &str, vector: Vec<f32>) -> Result<()>;
    async fn set_payload_english_text(&self, point_id: &str, english_text: &str) -> Result<()>;
    async fn search(
        &self,
        vector: Vec<f32>,
        room_key: &str,
        organization_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;
    async fn scroll(&self, room_key: &str, organization_id: Option<&str>, limit: usize) -> Result<Vec<ScoredPoint>>;
}

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_to_english(&self, text: &str) -> Result<String>;
}

fn validate_room_key(room_key: &str) -> Result<Uuid> {
    Uuid::parse_str(room_key).map_err(|_| SemanticError::InvalidRoomKey(Some(room_key.to_string())))
}

#[derive(Clone)]
pub struct TranscriptIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn TextEmbedder>,
    translator: Arc<dyn Translator>,
}

impl TranscriptIndexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn TextEmbedder>, translator: Arc<dyn Translator>) -> Self {
        Self {
            store,
            embedder,
            translator,
        }
    }

    /// Upserts the original-language transcript immediately, then fires a
    /// background task that replaces the vector with an English-translated
    /// one once translation completes. The caller does not wait on it.
    pub async fn save(
        &self,
        room_id: &str,
        speaker: &str,
        original_text: &str,
        original_language: &str,
        timestamp: i64,
        organization_id: Option<&str>,
        room_key: &str,
    ) -> Result<()> {
        validate_room_key(room_key)?;

        let vector = self.embedder.embed(original_text).await?;
        let point_id = Uuid::new_v4().to_string();
        let payload = TranscriptPayload {
            original_text: original_text.to_string(),
            original_language: original_language.to_string(),
            room_id: room_id.to_string(),
            room_key: room_key.to_string(),
            speaker: speaker.to_string(),
            timestamp,
            organization_id: organization_id.map(str::to_string),
            english_text: None,
        };

        self.store
            .upsert(Point {
                id: point_id.clone(),
                vector,
                payload,
            })
            .await?;
        info!(point_id = %point_id, room_key, "saved original transcript");

        let this = self.clone();
        let original_text = original_text.to_string();
        tokio::spawn(async move {
            this.translate_and_update_in_background(point_id, original_text).await;
        });

        Ok(())
    }

    async fn translate_and_update_in_background(&self, point_id: String, original_text: String) {
        let english_text = match self.translator.translate_to_english(&original_text).await {
            Ok(text) => text,
            Err(e) => {
                error!(point_id = %point_id, error = %e, "background translation failed");
                return;
            }
        };

        if english_text.is_empty() || english_text == original_text {
            warn!(point_id = %point_id, "translation skipped or identical to source, leaving point as-is");
            return;
        }

        let english_vector = match self.embedder.embed(&english_text).await {
            Ok(v) => v,
            Err(e) => {
                error!(point_id = %point_id, error = %e, "embedding English translation failed");
                return;
            }
        };

        if let Err(e) = self.store.set_payload_english_text(&point_id, &english_text).await {
            error!(point_id = %point_id, error = %e, "failed to set english_text payload");
            return;
        }
        if let Err(e) = self.store.update_vector(&point_id, english_vector).await {
            error!(point_id = %point_id, error = %e, "failed to update vector with English embedding");
            return;
        }
        info!(point_id = %point_id, "updated point with English translation and vector");
    }

    /// Two-vector semantic search (original-language query + English
    /// translation of it), merged by point id keeping the higher score,
    /// filtered to scores at or above the search threshold.
    pub async fn search(
        &self,
        query: &str,
        room_key: &str,
        organization_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_room_key(room_key)?;

        let original_vector = self.embedder.embed(query).await?;
        let results_original = self.store.search(original_vector, room_key, organization_id, limit).await?;

        let english_query = self
            .translator
            .translate_to_english(query)
            .await
            .unwrap_or_else(|_| query.to_string());
        let english_vector = self.embedder.embed(&english_query).await?;
        let results_english = self.store.search(english_vector, room_key, organization_id, limit).await?;

        let mut merged: std::collections::HashMap<String, ScoredPoint> = std::collections::HashMap::new();
        for hit in results_original.into_iter().chain(results_english) {
            merged
                .entry(hit.id.clone())
                .and_modify(|existing| {
                    if hit.score > existing.score {
                        *existing = hit.clone();
                    }
                })
                .or_insert(hit);
        }

        let mut sorted: Vec<ScoredPoint> = merged.into_values().collect();
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(limit);

        Ok(sorted
            .into_iter()
            .filter(|p| p.score >= SEARCH_SCORE_THRESHOLD)
            .filter(|p| !p.payload.original_text.is_empty())
            .map(|p| SearchResult {
                text: format!("{}: {}", p.payload.speaker, p.payload.original_text),
                room_id: Some(p.payload.room_id),
                timestamp: p.payload.timestamp,
                score: p.score,
            })
            .collect())
    }

    /// Returns every transcript line for a room, bounded to `SCROLL_LIMIT`.
    /// Used for summary prompts.
    pub async fn get_all(&self, room_key: &str, organization_id: Option<&str>) -> Result<Vec<TranscriptLine>> {
        validate_room_key(room_key)?;
        let points = self.store.scroll(room_key, organization_id, SCROLL_LIMIT).await?;
        Ok(points
            .into_iter()
            .map(|p| TranscriptLine {
                text: format!("{}: {}", p.payload.speaker, p.payload.original_text),
                speaker: p.payload.speaker,
                timestamp: p.payload.timestamp,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap as StdHashMap;

    struct FakeStore {
        points: Mutex<StdHashMap<String, Point>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                points: Mutex::new(StdHashMap::new()),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn upsert(&self, point: Point) -> Result<()> {
            self.points.lock().insert(point.id.clone(), point);
            Ok(())
        }

        async fn update_vector(&self, point_id: &str, vector: Vec<f32>) -> Result<()> {
            if let Some(p) = self.points.lock().get_mut(point_id) {
                p.vector = vector;
            }
            Ok(())
        }

        async fn set_payload_english_text(&self, point_id: &str, english_text: &str) -> Result<()> {
            if let Some(p) = self.points.lock().get_mut(point_id) {
                p.payload.english_text = Some(english_text.to_string());
            }
            Ok(())
        }

        async fn search(
            &self,
            vector: Vec<f32>,
            room_key: &str,
            _organization_id: Option<&str>,
            limit: usize,
        ) -> Result<Vec<ScoredPoint>> {
            let points = self.points.lock();
            let mut hits: Vec<ScoredPoint> = points
                .values()
                .filter(|p| p.payload.room_key == room_key)
                .map(|p| ScoredPoint {
                    id: p.id.clone(),
                    payload: p.payload.clone(),
                    score: cosine(&vector, &p.vector),
                })
                .collect();
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            hits.truncate(limit);
            Ok(hits)
        }

        async fn scroll(&self, room_key: &str, _organization_id: Option<&str>, limit: usize) -> Result<Vec<ScoredPoint>> {
            let points = self.points.lock();
            Ok(points
                .values()
                .filter(|p| p.payload.room_key == room_key)
                .take(limit)
                .map(|p| ScoredPoint {
                    id: p.id.clone(),
                    payload: p.payload.clone(),
                    score: 1.0,
                })
                .collect())
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    struct FakeEmbedder;
    #[async_trait]
    impl TextEmbedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Deterministic pseudo-embedding: bucket by first character.
            let seed = text.bytes().next().unwrap_or(0) as f32;
            Ok(vec![seed, seed / 2.0, 1.0])
        }
    }

    struct FakeTranslator;
    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate_to_english(&self, text: &str) -> Result<String> {
            Ok(format!("en:{text}"))
        }
    }

    fn indexer() -> TranscriptIndexer {
        TranscriptIndexer::new(Arc::new(FakeStore::new()), Arc::new(FakeEmbedder), Arc::new(FakeTranslator))
    }

    const ROOM_KEY: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[tokio::test]
    async fn save_rejects_missing_or_invalid_room_key() {
        let idx = indexer();
        let err = idx
            .save("room", "speaker", "hello", "en", 0, None, "not-a-uuid")
            .await
            .unwrap_err();
        assert!(matches!(err, SemanticError::InvalidRoomKey(_)));
    }

    #[tokio::test]
    async fn save_then_search_finds_the_transcript() {
        let idx = indexer();
        idx.save("room-1", "Alice", "hello world", "en", 1000, None, ROOM_KEY)
            .await
            .unwrap();
        let results = idx.search("hello world", ROOM_KEY, None, 10).await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].text.contains("Alice"));
    }

    #[tokio::test]
    async fn get_all_returns_every_saved_line_for_the_room() {
        let idx = indexer();
        idx.save("room-1", "Alice", "one", "en", 1, None, ROOM_KEY).await.unwrap();
        idx.save("room-1", "Bob", "two", "en", 2, None, ROOM_KEY).await.unwrap();
        let lines = idx.get_all(ROOM_KEY, None).await.unwrap();
        assert_eq!(lines.len(), 2);
    }
}
