//! Wires the port allocator, shared socket hub, translation pipeline,
//! transcript indexer and cabin manager into a running relay, and hosts
//! the three gRPC services over it.

pub mod collaborators;
pub mod config;
pub mod grpc;
pub mod proto;

use crate::collaborators::{
    HttpAnswerer, HttpSpeechToText, HttpTextEmbedder, HttpTextToSpeech, HttpTranslator, HttpTranslatorEnglish,
    HttpVoiceEmbedder, JsonClient, QdrantVectorStore,
};
use crate::config::ServerConfig;
use anyhow::{Context, Result};
use relay_audio::OpusCodecCache;
use relay_cabin::CabinManager;
use relay_pipeline::{PipelineCache, TranslationPipeline, VoiceCloneConfig, VoiceCloneStore};
use relay_ports::{PortAllocator, PortRange};
use relay_semantic::TranscriptIndexer;
use relay_socket::{SharedSocketHub, SocketHubConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server as TonicServer;

pub struct Server {
    config: ServerConfig,
    cabins: Arc<CabinManager>,
    socket_hub: Arc<SharedSocketHub>,
    ports: Arc<PortAllocator>,
    transcript_indexer: Arc<TranscriptIndexer>,
    answerer: Arc<dyn crate::collaborators::Answerer>,
    stt: Arc<dyn relay_pipeline::SpeechToText>,
    voice_store: Arc<VoiceCloneStore>,
}

impl Server {
    /// Builds the full runtime: binds the shared socket hub, constructs the
    /// HTTP collaborator adapters, and wires the pipeline and cabin
    /// manager. Fails if the shared receive socket cannot be bound.
    pub async fn neu(config: ServerConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.collaborators.request_timeout_secs);

        let ports = Arc::new(PortAllocator::new(PortRange::new(config.ports.min, config.ports.max)));

        let socket_hub = SharedSocketHub::bind(SocketHubConfig::default(), ports.clone())
            .await
            .context("failed to bind shared socket hub receive socket")?;
        let socket_hub = Arc::new(socket_hub);

        let codec = Arc::new(OpusCodecCache::new());

        let stt: Arc<dyn relay_pipeline::SpeechToText> = Arc::new(HttpSpeechToText::new(JsonClient::new(
            &config.collaborators.stt_url,
            timeout,
        )?));
        let translator: Arc<dyn relay_pipeline::Translator> = Arc::new(HttpTranslator::new(JsonClient::new(
            &config.collaborators.translation_url,
            timeout,
        )?));
        let tts: Arc<dyn relay_pipeline::TextToSpeech> = Arc::new(HttpTextToSpeech::new(JsonClient::new(
            &config.collaborators.tts_url,
            timeout,
        )?));
        let voice_embedder: Arc<dyn relay_pipeline::VoiceEmbedder> = Arc::new(HttpVoiceEmbedder::new(
            JsonClient::new(&config.collaborators.voice_embedding_url, timeout)?,
        ));

        let voice_store = Arc::new(VoiceCloneStore::new(voice_embedder, VoiceCloneConfig::default()));

        let pipeline = Arc::new(TranslationPipeline::new(
            stt.clone(),
            translator,
            tts,
            Some(voice_store.clone()),
        ));
        let pipeline_cache = Arc::new(PipelineCache::new(pipeline));

        let vector_store: Arc<dyn relay_semantic::VectorStore> = Arc::new(QdrantVectorStore::new(
            &config.qdrant.url,
            config.qdrant.api_key.as_deref(),
            &config.qdrant.collection_name,
            timeout,
        )?);
        let text_embedder: Arc<dyn relay_semantic::TextEmbedder> = Arc::new(HttpTextEmbedder::new(JsonClient::new(
            &config.collaborators.text_embedding_url,
            timeout,
        )?));
        let semantic_translator: Arc<dyn relay_semantic::Translator> = Arc::new(HttpTranslatorEnglish::new(
            JsonClient::new(&config.collaborators.translation_url, timeout)?,
        ));
        let transcript_indexer = Arc::new(TranscriptIndexer::new(vector_store, text_embedder, semantic_translator));

        let answerer: Arc<dyn crate::collaborators::Answerer> = Arc::new(HttpAnswerer::new(JsonClient::new(
            &config.collaborators.answerer_url,
            timeout,
        )?));

        let cabins = Arc::new(CabinManager::new(
            socket_hub.clone(),
            codec,
            pipeline_cache,
            Some(voice_store.clone()),
            Some(transcript_indexer.clone()),
            config.sfu.mediasoup_worker_host.clone(),
        ));

        Ok(Self {
            config,
            cabins,
            socket_hub,
            ports,
            transcript_indexer,
            answerer,
            stt,
            voice_store,
        })
    }

    /// Runs the relay until SIGINT/SIGTERM, then drains every registered
    /// cabin before returning.
    pub async fn starten(self) -> Result<()> {
        let router = self.socket_hub.spawn_router();

        let audio_service = grpc::AudioServiceImpl::new(self.cabins.clone(), self.ports.clone(), self.stt.clone());
        let semantic_service = grpc::SemanticServiceImpl::new(self.transcript_indexer.clone());
        let chatbot_service = grpc::ChatBotServiceImpl::new(self.transcript_indexer.clone(), self.answerer.clone());

        let audio_addr: SocketAddr = self.config.audio_grpc_bind_address().parse()?;
        let semantic_addr: SocketAddr = self.config.semantic_grpc_bind_address().parse()?;
        let chatbot_addr: SocketAddr = self.config.chatbot_grpc_bind_address().parse()?;
        let observability_addr: SocketAddr = self.config.observability_bind_address().parse()?;

        let observability_task = tokio::spawn(async move {
            relay_observability::observability_server_starten(observability_addr).await
        });
        let sweeper_task = self.voice_store.clone().spawn_sweeper();

        let audio_task = tokio::spawn(async move {
            TonicServer::builder()
                .add_service(grpc::AudioServiceServer::new(audio_service))
                .serve(audio_addr)
                .await
        });
        let semantic_task = tokio::spawn(async move {
            TonicServer::builder()
                .add_service(grpc::SemanticServiceServer::new(semantic_service))
                .serve(semantic_addr)
                .await
        });
        let chatbot_task = tokio::spawn(async move {
            TonicServer::builder()
                .add_service(grpc::ChatBotServiceServer::new(chatbot_service))
                .serve(chatbot_addr)
                .await
        });

        tracing::info!(
            audio = %audio_addr,
            semantic = %semantic_addr,
            chatbot = %chatbot_addr,
            observability = %observability_addr,
            "relay gRPC services listening"
        );

        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, draining cabins");

        for key in self.cabins.keys() {
            if let Err(e) = self
                .cabins
                .destroy_cabin(&key.room_id, &key.speaker_id, &key.source_lang, &key.target_lang)
                .await
            {
                tracing::warn!(cabin = %key, error = %e, "failed to destroy cabin during shutdown");
            }
        }

        self.socket_hub.shutdown();
        audio_task.abort();
        semantic_task.abort();
        chatbot_task.abort();
        observability_task.abort();
        sweeper_task.abort();
        router.abort();

        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
