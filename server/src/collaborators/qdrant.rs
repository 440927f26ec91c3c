//! Real Qdrant REST client implementing `relay_semantic::VectorStore`.
//!
//! Talks directly to Qdrant's documented HTTP API (no qdrant-client crate
//! involved): `PUT .../points`, `PUT .../points/vectors`, `POST
//! .../points/payload`, `POST .../points/search`, `POST .../points/scroll`.

use async_trait::async_trait;
use relay_semantic::{Point, Result as SemanticResult, ScoredPoint, SemanticError, TranscriptPayload, VectorStore};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub struct QdrantVectorStore {
    client: Client,
    base_url: Url,
    collection: String,
}

impl QdrantVectorStore {
    pub fn new(url: &str, api_key: Option<&str>, collection: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(url)?;
        let mut builder = Client::builder().timeout(timeout);
        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("api-key", reqwest::header::HeaderValue::from_str(key)?);
            builder = builder.default_headers(headers);
        }
        Ok(Self {
            client: builder.build()?,
            base_url,
            collection: collection.to_string(),
        })
    }

    fn collection_url(&self, suffix: &str) -> Url {
        self.base_url
            .join(&format!("collections/{}/{}", self.collection, suffix))
            .expect("suffix is a valid relative URL")
    }

    fn store_err(context: &str, e: impl std::fmt::Display) -> SemanticError {
        SemanticError::Store(format!("{context}: {e}"))
    }
}

fn payload_to_json(payload: &TranscriptPayload) -> Value {
    json!({
        "original_text": payload.original_text,
        "original_language": payload.original_language,
        "room_id": payload.room_id,
        "room_key": payload.room_key,
        "speaker": payload.speaker,
        "timestamp": payload.timestamp,
        "organization_id": payload.organization_id,
        "english_text": payload.english_text,
    })
}

fn payload_from_json(v: &Value) -> TranscriptPayload {
    TranscriptPayload {
        original_text: v.get("original_text").and_then(Value::as_str).unwrap_or("").to_string(),
        original_language: v.get("original_language").and_then(Value::as_str).unwrap_or("").to_string(),
        room_id: v.get("room_id").and_then(Value::as_str).unwrap_or("").to_string(),
        room_key: v.get("room_key").and_then(Value::as_str).unwrap_or("").to_string(),
        speaker: v.get("speaker").and_then(Value::as_str).unwrap_or("").to_string(),
        timestamp: v.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
        organization_id: v.get("organization_id").and_then(Value::as_str).map(str::to_string),
        english_text: v.get("english_text").and_then(Value::as_str).map(str::to_string),
    }
}

fn room_filter(room_key: &str, organization_id: Option<&str>) -> Value {
    let mut must = vec![json!({"key": "room_key", "match": {"value": room_key}})];
    if let Some(org) = organization_id {
        must.push(json!({"key": "organization_id", "match": {"value": org}}));
    }
    json!({ "must": must })
}

fn parse_scored_points(results: &[Value]) -> Vec<ScoredPoint> {
    results
        .iter()
        .map(|r| ScoredPoint {
            id: r.get("id").map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_default(),
            payload: r.get("payload").map(payload_from_json).unwrap_or_else(|| payload_from_json(&Value::Null)),
            score: r.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, point: Point) -> SemanticResult<()> {
        let body = json!({
            "points": [{
                "id": point.id,
                "vector": point.vector,
                "payload": payload_to_json(&point.payload),
            }]
        });
        self.client
            .put(self.collection_url("points"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("upsert", e))?
            .error_for_status()
            .map_err(|e| Self::store_err("upsert", e))?;
        Ok(())
    }

    async fn update_vector(&self, point_id: &str, vector: Vec<f32>) -> SemanticResult<()> {
        let body = json!({ "points": [{ "id": point_id, "vector": vector }] });
        self.client
            .put(self.collection_url("points/vectors"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("update_vector", e))?
            .error_for_status()
            .map_err(|e| Self::store_err("update_vector", e))?;
        Ok(())
    }

    async fn set_payload_english_text(&self, point_id: &str, english_text: &str) -> SemanticResult<()> {
        let body = json!({
            "payload": { "english_text": english_text },
            "points": [point_id],
        });
        self.client
            .post(self.collection_url("points/payload"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("set_payload_english_text", e))?
            .error_for_status()
            .map_err(|e| Self::store_err("set_payload_english_text", e))?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        room_key: &str,
        organization_id: Option<&str>,
        limit: usize,
    ) -> SemanticResult<Vec<ScoredPoint>> {
        let body = json!({
            "vector": vector,
            "filter": room_filter(room_key, organization_id),
            "limit": limit,
            "with_payload": true,
        });
        let response: Value = self
            .client
            .post(self.collection_url("points/search"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("search", e))?
            .error_for_status()
            .map_err(|e| Self::store_err("search", e))?
            .json()
            .await
            .map_err(|e| Self::store_err("search", e))?;

        let results = response.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(parse_scored_points(&results))
    }

    async fn scroll(&self, room_key: &str, organization_id: Option<&str>, limit: usize) -> SemanticResult<Vec<ScoredPoint>> {
        let body = json!({
            "filter": room_filter(room_key, organization_id),
            "limit": limit,
            "with_payload": true,
        });
        let response: Value = self
            .client
            .post(self.collection_url("points/scroll"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::store_err("scroll", e))?
            .error_for_status()
            .map_err(|e| Self::store_err("scroll", e))?
            .json()
            .await
            .map_err(|e| Self::store_err("scroll", e))?;

        let points = response
            .get("result")
            .and_then(|r| r.get("points"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(parse_scored_points(&points))
    }
}
