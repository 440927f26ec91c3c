//! A single translation cabin: one (room, speaker, source language, target
//! language) audio flow, from inbound RTP to translated (or passthrough)
//! outbound RTP.

use crate::queue::WorkQueue;
use crate::status::CabinStatus;
use crate::text::split_into_clauses;
use parking_lot::Mutex;
use relay_audio::dsp::{noise_gate::NoiseGate, noise_gate::NoiseGateConfig, vad::Vad, vad::VadConfig, AudioProcessor};
use relay_audio::{buffer::SlidingAudioBuffer, buffer::SlidingBufferConfig, OpusCodecCache};
use relay_core::{CabinKey, LanguageCode, RoomId, SpeakerId};
use relay_pipeline::{PipelineCache, PipelineOutcome, VoiceCloneStore};
use relay_semantic::TranscriptIndexer;
use relay_socket::SharedSocketHub;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const STEREO_FRAME_SAMPLES: usize = 1920;
const CHUNK_DURATION: Duration = Duration::from_millis(20);
const PACING_SLIP_TOLERANCE: Duration = Duration::from_millis(10);
const SEND_SUCCESS_RATIO: f32 = 0.8;
const DEFAULT_ACCEPTED_PAYLOAD_TYPES: [u8; 2] = [100, 111];
const DEFAULT_OUTBOUND_PAYLOAD_TYPE: u8 = 100;
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Cabin {
    pub room_id: RoomId,
    pub speaker_id: SpeakerId,
    source_lang: Mutex<LanguageCode>,
    target_lang: Mutex<LanguageCode>,
    /// The key this cabin was registered with the shared socket hub under.
    /// Unlike `key()`, this never changes across a language update, since
    /// the socket hub's registration must be unregistered with the same
    /// key it was created with.
    registration_key: CabinKey,
    pub ssrc: u32,
    status: Mutex<CabinStatus>,
    running: AtomicBool,
    buffer: Mutex<SlidingAudioBuffer>,
    vad: Mutex<Vad>,
    noise_gate: Mutex<NoiseGate>,
    rtp_state: Mutex<relay_rtp::OutboundRtpState>,
    queue: Arc<WorkQueue>,
    codec: Arc<OpusCodecCache>,
    socket_hub: Arc<SharedSocketHub>,
    pipeline_cache: Arc<PipelineCache>,
    voice_store: Option<Arc<VoiceCloneStore>>,
    transcript_indexer: Option<Arc<TranscriptIndexer>>,
    sfu_send_addr: Mutex<SocketAddr>,
    accepted_payload_types: HashSet<u8>,
    outbound_payload_type: u8,
}

#[allow(clippy::too_many_arguments)]
impl Cabin {
    pub fn new(
        room_id: RoomId,
        speaker_id: SpeakerId,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
        ssrc: u32,
        sfu_send_addr: SocketAddr,
        codec: Arc<OpusCodecCache>,
        socket_hub: Arc<SharedSocketHub>,
        pipeline_cache: Arc<PipelineCache>,
        voice_store: Option<Arc<VoiceCloneStore>>,
        transcript_indexer: Option<Arc<TranscriptIndexer>>,
    ) -> Arc<Self> {
        let registration_key = CabinKey::new(room_id.clone(), speaker_id.clone(), source_lang.clone(), target_lang.clone());
        Arc::new(Self {
            room_id,
            speaker_id,
            source_lang: Mutex::new(source_lang),
            target_lang: Mutex::new(target_lang),
            registration_key,
            ssrc,
            status: Mutex::new(CabinStatus::Idle),
            running: AtomicBool::new(false),
            buffer: Mutex::new(SlidingAudioBuffer::new(SlidingBufferConfig::default())),
            vad: Mutex::new(Vad::new(VadConfig::default())),
            noise_gate: Mutex::new(NoiseGate::new(NoiseGateConfig::default())),
            rtp_state: Mutex::new(relay_rtp::OutboundRtpState::new()),
            queue: Arc::new(WorkQueue::new(64)),
            codec,
            socket_hub,
            pipeline_cache,
            voice_store,
            transcript_indexer,
            sfu_send_addr: Mutex::new(sfu_send_addr),
            accepted_payload_types: DEFAULT_ACCEPTED_PAYLOAD_TYPES.into_iter().collect(),
            outbound_payload_type: DEFAULT_OUTBOUND_PAYLOAD_TYPE,
        })
    }

    pub fn key(&self) -> CabinKey {
        CabinKey::new(
            self.room_id.clone(),
            self.speaker_id.clone(),
            self.source_lang.lock().clone(),
            self.target_lang.lock().clone(),
        )
    }

    pub fn registration_key(&self) -> &CabinKey {
        &self.registration_key
    }

    pub fn languages(&self) -> (LanguageCode, LanguageCode) {
        (self.source_lang.lock().clone(), self.target_lang.lock().clone())
    }

    pub fn set_languages(&self, source: LanguageCode, target: LanguageCode) {
        *self.source_lang.lock() = source;
        *self.target_lang.lock() = target;
    }

    pub fn status(&self) -> CabinStatus {
        *self.status.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        let mut status = self.status.lock();
        if running && *status == CabinStatus::Idle {
            *status = CabinStatus::Listening;
        }
    }

    pub fn set_sfu_send_addr(&self, addr: SocketAddr) {
        *self.sfu_send_addr.lock() = addr;
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn drain_queue(&self) {
        self.queue.drain();
    }

    /// Invoked synchronously by the shared socket hub's router for every
    /// datagram routed to this cabin's SSRC. Must not block on I/O; voice
    /// clone collection is fired off as a detached task.
    pub fn handle_inbound(self: &Arc<Self>, packet: &[u8]) {
        let rtp = match relay_rtp::parse(packet) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "dropping unparseable RTP packet");
                return;
            }
        };

        if !self.accepted_payload_types.contains(&rtp.payload_type) {
            debug!(pt = rtp.payload_type, "dropping packet with unaccepted payload type");
            return;
        }

        let key = self.key();
        let pcm48 = match self.codec.decode(&key, rtp.payload) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "opus decode failed, dropping packet");
                return;
            }
        };
        if pcm48.is_empty() {
            return;
        }

        let mono16 = match relay_audio::resample::downsample_48k_stereo_to_16k_mono(&pcm48) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "downsample failed, dropping packet");
                return;
            }
        };

        if let Some(store) = self.voice_store.clone() {
            let speaker = self.speaker_id.clone();
            let room = self.room_id.clone();
            let chunk = mono16.clone();
            tokio::spawn(async move {
                store.collect(speaker, room, 16_000, &chunk).await;
            });
        }

        let window = {
            let mut buf = self.buffer.lock();
            buf.add_audio_chunk(&pcm_to_bytes(&mono16))
        };

        if let Some(window_bytes) = window {
            self.queue.push(bytes_to_pcm(&window_bytes));
        }
    }

    /// Runs until `running` is cleared. Owns the cabin's serial execution
    /// context: VAD, translation and emission for this cabin never overlap.
    pub async fn run_worker(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            let window = match self.queue.pop_timeout(WORKER_POLL_INTERVAL).await {
                Some(w) => w,
                None => continue,
            };
            self.process_window(window).await;
        }
    }

    async fn process_window(self: &Arc<Self>, window: Vec<i16>) {
        let is_speech = self.vad.lock().detect_speech(&window);

        if !is_speech {
            self.emit_pcm(&window, 16_000).await;
            return;
        }

        *self.status.lock() = CabinStatus::Translating;
        let key = self.key();
        let (source, target) = self.languages();
        let pipeline = self.pipeline_cache.get_or_create(&key, &source, &target);
        let outcome = pipeline
            .process(&window, 16_000, &source, &target, &self.speaker_id, &self.room_id)
            .await;
        *self.status.lock() = CabinStatus::Listening;

        match outcome {
            PipelineOutcome::NoSpeech => {}
            PipelineOutcome::Failed { reason } => {
                warn!(cabin = %key, reason, "pipeline failed for this window");
            }
            PipelineOutcome::Translated { text, pcm, sample_rate } => {
                self.emit_translated(&text, pcm, sample_rate, &target).await;
                self.index_transcript(&text, &source);
            }
        }
    }

    async fn emit_translated(self: &Arc<Self>, text: &str, pcm: Vec<i16>, sample_rate: u32, target: &LanguageCode) {
        let key = self.key();
        let source = self.source_lang.lock().clone();
        let pipeline = self.pipeline_cache.get_or_create(&key, &source, target);

        match split_into_clauses(text) {
            Some(clauses) => {
                for clause in clauses {
                    match pipeline
                        .synthesize_clause(&clause, target, &self.speaker_id, &self.room_id)
                        .await
                    {
                        Ok(audio) => {
                            self.emit_pcm(&audio.pcm, audio.sample_rate).await;
                        }
                        Err(e) => {
                            warn!(cabin = %key, error = %e, "clause synthesis failed, skipping clause");
                        }
                    }
                }
            }
            None => {
                self.emit_pcm(&pcm, sample_rate).await;
            }
        }
    }

    fn index_transcript(self: &Arc<Self>, text: &str, source: &LanguageCode) {
        let Some(indexer) = self.transcript_indexer.clone() else {
            return;
        };
        let Some(room_key) = self.room_id.as_uuid() else {
            debug!(room_id = %self.room_id, "skipping transcript index, room_id is not a UUID room_key");
            return;
        };

        let room_id = self.room_id.clone();
        let speaker_id = self.speaker_id.clone();
        let source = source.clone();
        let text = text.to_string();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        tokio::spawn(async move {
            let room_key_str = room_key.to_string();
            if let Err(e) = indexer
                .save(
                    room_id.as_str(),
                    speaker_id.as_str(),
                    &text,
                    source.as_str(),
                    timestamp,
                    None,
                    &room_key_str,
                )
                .await
            {
                warn!(error = %e, "failed to submit transcript for indexing");
            }
        });
    }

    /// Resamples to 48kHz stereo, noise-gates, chunks into 20ms Opus frames
    /// and paces emission over the shared socket hub.
    async fn emit_pcm(self: &Arc<Self>, pcm: &[i16], sample_rate: u32) -> bool {
        let mut stereo48 = match relay_audio::resample::upsample_to_48k_stereo(pcm, sample_rate) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "resample to 48kHz stereo failed, dropping utterance");
                return false;
            }
        };
        self.noise_gate.lock().process(&mut stereo48);

        let key = self.key();
        let dest = *self.sfu_send_addr.lock();
        let chunks: Vec<&[i16]> = stereo48.chunks(STEREO_FRAME_SAMPLES).collect();
        if chunks.is_empty() {
            return true;
        }

        let start = Instant::now();
        let mut success_count = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            let expected_at = start + CHUNK_DURATION * i as u32;
            let now = Instant::now();
            let lag = now.saturating_duration_since(expected_at);
            if lag <= PACING_SLIP_TOLERANCE && expected_at > now {
                tokio::time::sleep(expected_at - now).await;
            }

            let mut padded = chunk.to_vec();
            if padded.len() < STEREO_FRAME_SAMPLES {
                let last = *padded.last().unwrap_or(&0);
                padded.resize(STEREO_FRAME_SAMPLES, last);
            }

            let encoded = match self.codec.encode(&key, &padded) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "opus encode failed for chunk, skipping");
                    continue;
                }
            };

            let (sequence, timestamp) = self.rtp_state.lock().next_frame();
            let packet = relay_rtp::build(self.outbound_payload_type, false, sequence, timestamp, self.ssrc, &encoded);
            if self.socket_hub.send(&packet, dest).await {
                success_count += 1;
            }
        }

        let ratio = success_count as f32 / chunks.len() as f32;
        if ratio < SEND_SUCCESS_RATIO {
            warn!(cabin = %key, ratio, "utterance emission below success threshold");
        }
        ratio >= SEND_SUCCESS_RATIO
    }
}

fn pcm_to_bytes(pcm: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm.len() * 2);
    for &s in pcm {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

fn bytes_to_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
}
