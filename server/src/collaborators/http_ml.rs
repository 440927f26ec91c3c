//! Generic JSON/HTTP adapters for the STT/NMT/TTS/embedding collaborators.
//! Each service's wire contract is a plain JSON POST of the request fields
//! and a JSON response with the matching output field; these services are
//! black boxes, not something this relay ships.

use async_trait::async_trait;
use base64::Engine;
use relay_core::{LanguageCode, RoomId, SpeakerId};
use relay_pipeline::{PipelineError, Result as PipelineResult, SpeechToText, SynthesizedAudio, TextToSpeech, Translator, VoiceEmbedder};
use relay_semantic::{Result as SemanticResult, SemanticError, TextEmbedder};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

/// Shared REST plumbing: a `reqwest::Client` plus a base URL, following the
/// `Client`+`base_url: Url` shape common to REST-backed API clients.
#[derive(Clone)]
pub struct JsonClient {
    client: Client,
    url: Url,
}

impl JsonClient {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub async fn post_json<Req: Serialize + Sync, Res: DeserializeOwned>(
        &self,
        body: &Req,
    ) -> anyhow::Result<Res> {
        let response = self.client.post(self.url.clone()).json(body).send().await?;
        let response = response.error_for_status()?;
        Ok(response.json::<Res>().await?)
    }
}

// ---- relay-pipeline collaborators ----------------------------------------

pub struct HttpSpeechToText {
    client: JsonClient,
}

impl HttpSpeechToText {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    language: &'a str,
    audio_base64: String,
}

#[derive(serde::Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, wav: &[u8], language: &LanguageCode) -> PipelineResult<String> {
        let request = TranscribeRequest {
            language: language.as_str(),
            audio_base64: base64::engine::general_purpose::STANDARD.encode(wav),
        };
        let response: TranscribeResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| PipelineError::Stt(e.to_string()))?;
        Ok(response.text)
    }
}

pub struct HttpTranslator {
    client: JsonClient,
}

impl HttpTranslator {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(serde::Deserialize)]
struct TranslateResponse {
    text: String,
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &LanguageCode, target: &LanguageCode) -> PipelineResult<String> {
        let request = TranslateRequest {
            text,
            source: source.as_str(),
            target: target.as_str(),
        };
        let response: TranslateResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| PipelineError::Translate(e.to_string()))?;
        Ok(response.text)
    }
}

pub struct HttpTextToSpeech {
    client: JsonClient,
}

impl HttpTextToSpeech {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    target: &'a str,
    speaker_id: &'a str,
    room_id: &'a str,
    voice_embedding: Option<&'a [f32]>,
}

#[derive(serde::Deserialize)]
struct SynthesizeResponse {
    pcm: Vec<i16>,
    sample_rate: u32,
}

#[async_trait]
impl TextToSpeech for HttpTextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        target: &LanguageCode,
        speaker_id: &SpeakerId,
        room_id: &RoomId,
        voice_embedding: Option<&[f32]>,
    ) -> PipelineResult<SynthesizedAudio> {
        let request = SynthesizeRequest {
            text,
            target: target.as_str(),
            speaker_id: speaker_id.as_str(),
            room_id: room_id.as_str(),
            voice_embedding,
        };
        let response: SynthesizeResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| PipelineError::Tts(e.to_string()))?;
        Ok(SynthesizedAudio {
            pcm: response.pcm,
            sample_rate: response.sample_rate,
        })
    }
}

pub struct HttpVoiceEmbedder {
    client: JsonClient,
}

impl HttpVoiceEmbedder {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct VoiceEmbedRequest<'a> {
    pcm: &'a [i16],
    sample_rate: u32,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl VoiceEmbedder for HttpVoiceEmbedder {
    async fn extract_embedding(&self, pcm: &[i16], sample_rate: u32) -> PipelineResult<Vec<f32>> {
        let request = VoiceEmbedRequest { pcm, sample_rate };
        let response: EmbedResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;
        Ok(response.embedding)
    }
}

// ---- relay-semantic collaborators ----------------------------------------

pub struct HttpTextEmbedder {
    client: JsonClient,
}

impl HttpTextEmbedder {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct TextEmbedRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl TextEmbedder for HttpTextEmbedder {
    async fn embed(&self, text: &str) -> SemanticResult<Vec<f32>> {
        let request = TextEmbedRequest { text };
        let response: EmbedResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| SemanticError::Embed(e.to_string()))?;
        Ok(response.embedding)
    }
}

/// `relay_semantic::Translator` implementation: always translates to
/// English, regardless of source language.
pub struct HttpTranslatorEnglish {
    client: JsonClient,
}

impl HttpTranslatorEnglish {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct TranslateToEnglishRequest<'a> {
    text: &'a str,
    target: &'a str,
}

#[async_trait]
impl relay_semantic::Translator for HttpTranslatorEnglish {
    async fn translate_to_english(&self, text: &str) -> SemanticResult<String> {
        let request = TranslateToEnglishRequest { text, target: "en" };
        let response: TranslateResponse = self
            .client
            .post_json(&request)
            .await
            .map_err(|e| SemanticError::Translate(e.to_string()))?;
        Ok(response.text)
    }
}
