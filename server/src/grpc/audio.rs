//! `AudioService`: cabin lifecycle plus the legacy batch-transcription path.

use crate::proto::{
    AllocatePortRequest, AllocatePortResponse, AllocateTranslationPortRequest, AllocateTranslationPortResponse,
    CreateTranslationProduceRequest, CreateTranslationProduceResponse, DestroyCabinRequest, DestroyCabinResponse,
    GetTranscriptsRequest, GetTranscriptsResponse, ProcessAudioBufferRequest, ProcessAudioBufferResponse,
    ProcessAudioChunkRequest, ReleasePortRequest, ReleasePortResponse,
};
use relay_cabin::CabinManager;
use relay_core::{LanguageCode, RoomId, SpeakerId};
use relay_pipeline::SpeechToText;
use relay_ports::PortAllocator;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Default language pair a cabin is created with before the SFU tells us
/// which languages the speaker and listener actually want.
const DEFAULT_SOURCE_LANG: &str = "vi";
const DEFAULT_TARGET_LANG: &str = "en";

pub struct AudioServiceImpl {
    cabins: Arc<CabinManager>,
    ports: Arc<PortAllocator>,
    stt: Arc<dyn SpeechToText>,
}

impl AudioServiceImpl {
    pub fn new(cabins: Arc<CabinManager>, ports: Arc<PortAllocator>, stt: Arc<dyn SpeechToText>) -> Self {
        Self { cabins, ports, stt }
    }

    async fn process_buffer(
        &self,
        buffer: &[u8],
        sample_rate: u32,
        channels: u32,
    ) -> Result<String, String> {
        let pcm = bytes_to_pcm(buffer);
        let wav = relay_audio::wav::pcm_to_wav_bytes(&pcm, sample_rate, channels as u16)
            .map_err(|e| e.to_string())?;
        self.stt
            .transcribe(&wav, &LanguageCode::new(DEFAULT_SOURCE_LANG))
            .await
            .map_err(|e| e.to_string())
    }
}

fn bytes_to_pcm(buffer: &[u8]) -> Vec<i16> {
    buffer
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[tonic::async_trait]
impl crate::proto::audio_service_server::AudioService for AudioServiceImpl {
    async fn process_audio_buffer(
        &self,
        request: Request<ProcessAudioBufferRequest>,
    ) -> Result<Response<ProcessAudioBufferResponse>, Status> {
        let req = request.into_inner();
        match self.process_buffer(&req.buffer, req.sample_rate, req.channels).await {
            Ok(transcript) => Ok(Response::new(ProcessAudioBufferResponse {
                success: true,
                message: "ok".into(),
                transcript,
                confidence: 1.0,
            })),
            Err(reason) => Ok(Response::new(ProcessAudioBufferResponse {
                success: false,
                message: reason,
                transcript: String::new(),
                confidence: 0.0,
            })),
        }
    }

    async fn allocate_translation_port(
        &self,
        request: Request<AllocateTranslationPortRequest>,
    ) -> Result<Response<AllocateTranslationPortResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .cabins
            .create_cabin(
                RoomId::new(req.room_id.as_str()),
                SpeakerId::new(req.user_id.as_str()),
                LanguageCode::new(DEFAULT_SOURCE_LANG),
                LanguageCode::new(DEFAULT_TARGET_LANG),
                0,
            )
            .await;

        match result {
            Ok(info) => Ok(Response::new(AllocateTranslationPortResponse {
                success: true,
                port: u32::from(info.rtp_port),
                send_port: u32::from(info.send_port),
                ssrc: info.ssrc,
                ready: true,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "allocate_translation_port failed");
                Ok(Response::new(AllocateTranslationPortResponse {
                    success: false,
                    port: 0,
                    send_port: 0,
                    ssrc: 0,
                    ready: false,
                }))
            }
        }
    }

    async fn create_translation_produce(
        &self,
        request: Request<CreateTranslationProduceRequest>,
    ) -> Result<Response<CreateTranslationProduceResponse>, Status> {
        let req = request.into_inner();
        let room_id = RoomId::new(req.room_id.as_str());
        let speaker_id = SpeakerId::new(req.user_id.as_str());

        let Some(old_key) = self.cabins.find_cabin_by_user(&room_id, &speaker_id) else {
            return Ok(Response::new(CreateTranslationProduceResponse {
                success: false,
                message: "no cabin allocated for this user; call AllocateTranslationPort first".into(),
                stream_id: String::new(),
            }));
        };

        match self
            .cabins
            .update_cabin_languages(
                &old_key,
                LanguageCode::new(req.source_language.as_str()),
                LanguageCode::new(req.target_language.as_str()),
            )
            .await
        {
            Ok(_) => {
                let stream_id = format!("translation_{}_{}", req.user_id, unix_seconds_placeholder());
                Ok(Response::new(CreateTranslationProduceResponse {
                    success: true,
                    message: "translation stream ready".into(),
                    stream_id,
                }))
            }
            Err(e) => Ok(Response::new(CreateTranslationProduceResponse {
                success: false,
                message: e.to_string(),
                stream_id: String::new(),
            })),
        }
    }

    async fn destroy_cabin(
        &self,
        request: Request<DestroyCabinRequest>,
    ) -> Result<Response<DestroyCabinResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .cabins
            .destroy_cabin(
                &RoomId::new(req.room_id.as_str()),
                &SpeakerId::new(req.target_user_id.as_str()),
                &LanguageCode::new(req.source_language.as_str()),
                &LanguageCode::new(req.target_language.as_str()),
            )
            .await;

        Ok(Response::new(match result {
            Ok(()) => DestroyCabinResponse {
                success: true,
                message: "cabin destroyed".into(),
            },
            Err(e) => DestroyCabinResponse {
                success: false,
                message: e.to_string(),
            },
        }))
    }

    async fn allocate_port(
        &self,
        request: Request<AllocatePortRequest>,
    ) -> Result<Response<AllocatePortResponse>, Status> {
        let _req = request.into_inner();
        let port = self.ports.allocate(0).await.unwrap_or(0);
        Ok(Response::new(AllocatePortResponse {
            success: port != 0,
            port: u32::from(port),
            ready: port != 0,
        }))
    }

    async fn release_port(
        &self,
        request: Request<ReleasePortRequest>,
    ) -> Result<Response<ReleasePortResponse>, Status> {
        let _req = request.into_inner();
        Ok(Response::new(ReleasePortResponse { success: true }))
    }

    async fn process_audio_chunk(
        &self,
        request: Request<ProcessAudioChunkRequest>,
    ) -> Result<Response<ProcessAudioBufferResponse>, Status> {
        let req = request.into_inner();
        match self.process_buffer(&req.audio_buffer, 16_000, 1).await {
            Ok(transcript) => Ok(Response::new(ProcessAudioBufferResponse {
                success: true,
                message: "ok".into(),
                transcript,
                confidence: 1.0,
            })),
            Err(reason) => Ok(Response::new(ProcessAudioBufferResponse {
                success: false,
                message: reason,
                transcript: String::new(),
                confidence: 0.0,
            })),
        }
    }

    async fn get_transcripts(
        &self,
        request: Request<GetTranscriptsRequest>,
    ) -> Result<Response<GetTranscriptsResponse>, Status> {
        let _req = request.into_inner();
        Ok(Response::new(GetTranscriptsResponse {
            success: true,
            message: "ok".into(),
            transcripts: "[]".into(),
        }))
    }
}

fn unix_seconds_placeholder() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
