//! Keyed cabin registry. A single mutex guards the map; cabin-internal
//! state (buffers, queues, status) uses its own finer-grained locking so
//! the registry lock is only ever held for map bookkeeping.

use crate::cabin::Cabin;
use crate::error::{CabinError, Result};
use parking_lot::Mutex;
use relay_audio::OpusCodecCache;
use relay_core::{deterministic_ssrc, CabinKey, LanguageCode, RoomId, SpeakerId};
use relay_pipeline::{PipelineCache, VoiceCloneStore};
use relay_semantic::TranscriptIndexer;
use relay_socket::SharedSocketHub;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DESTROY_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CabinInfo {
    pub cabin_key: CabinKey,
    pub rtp_port: u16,
    pub send_port: u16,
    pub ssrc: u32,
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
}

struct Entry {
    cabin: Arc<Cabin>,
    worker: JoinHandle<()>,
    rtp_port: u16,
    send_port: u16,
}

pub struct CabinManager {
    registry: Mutex<HashMap<CabinKey, Entry>>,
    socket_hub: Arc<SharedSocketHub>,
    codec: Arc<OpusCodecCache>,
    pipeline_cache: Arc<PipelineCache>,
    voice_store: Option<Arc<VoiceCloneStore>>,
    transcript_indexer: Option<Arc<TranscriptIndexer>>,
    sfu_host: String,
}

impl CabinManager {
    pub fn new(
        socket_hub: Arc<SharedSocketHub>,
        codec: Arc<OpusCodecCache>,
        pipeline_cache: Arc<PipelineCache>,
        voice_store: Option<Arc<VoiceCloneStore>>,
        transcript_indexer: Option<Arc<TranscriptIndexer>>,
        sfu_host: String,
    ) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            socket_hub,
            codec,
            pipeline_cache,
            voice_store,
            transcript_indexer,
            sfu_host,
        }
    }

    pub async fn create_cabin(
        &self,
        room_id: RoomId,
        speaker_id: SpeakerId,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
        sfu_send_port: u16,
    ) -> Result<CabinInfo> {
        let key = CabinKey::new(room_id.clone(), speaker_id.clone(), source_lang.clone(), target_lang.clone());

        if let Some(entry) = self.registry.lock().get(&key) {
            return Ok(CabinInfo {
                cabin_key: key,
                rtp_port: entry.rtp_port,
                send_port: entry.send_port,
                ssrc: entry.cabin.ssrc,
                source_lang,
                target_lang,
            });
        }

        let ssrc = deterministic_ssrc(&key);
        let sfu_send_addr: SocketAddr = format!("{}:{}", self.sfu_host, sfu_send_port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], sfu_send_port)));

        let cabin = Cabin::new(
            room_id,
            speaker_id,
            source_lang.clone(),
            target_lang.clone(),
            ssrc,
            sfu_send_addr,
            self.codec.clone(),
            self.socket_hub.clone(),
            self.pipeline_cache.clone(),
            self.voice_store.clone(),
            self.transcript_indexer.clone(),
        );

        let callback_cabin = cabin.clone();
        let callback: relay_socket::RtpCallback = Arc::new(move |packet: &[u8]| {
            callback_cabin.handle_inbound(packet);
        });

        let (rtp_port, send_port) = match self.socket_hub.register(key.clone(), ssrc, callback).await {
            Ok(ports) => ports,
            Err(e) => {
                warn!(cabin = %key, error = %e, "failed to register cabin with the shared socket hub");
                return Err(CabinError::SocketRegistration(e));
            }
        };

        cabin.set_running(true);
        let worker = tokio::spawn(cabin.clone().run_worker());

        self.registry.lock().insert(
            key.clone(),
            Entry {
                cabin: cabin.clone(),
                worker,
                rtp_port,
                send_port,
            },
        );

        info!(cabin = %key, rtp_port, send_port, ssrc, "cabin created");
        Ok(CabinInfo {
            cabin_key: key,
            rtp_port,
            send_port,
            ssrc,
            source_lang,
            target_lang,
        })
    }

    /// Linear scan for any cabin belonging to this (room, speaker), ignoring
    /// the language pair. Used by the two-step create flow where languages
    /// are set in a second call.
    pub fn find_cabin_by_user(&self, room_id: &RoomId, speaker_id: &SpeakerId) -> Option<CabinKey> {
        self.registry
            .lock()
            .keys()
            .find(|k| k.same_speaker(room_id, speaker_id))
            .cloned()
    }

    /// Renames the cabin to a new language pair, preserving SSRC, worker
    /// and socket registration. Invalidates the cached pipeline pairing so
    /// a fresh one is associated on next use.
    pub async fn update_cabin_languages(
        &self,
        old_key: &CabinKey,
        new_source: LanguageCode,
        new_target: LanguageCode,
    ) -> Result<CabinKey> {
        let mut registry = self.registry.lock();
        let entry = registry.remove(old_key).ok_or_else(|| CabinError::NotFound(old_key.clone()))?;

        let changed = entry.cabin.languages() != (new_source.clone(), new_target.clone());
        entry.cabin.set_languages(new_source.clone(), new_target.clone());
        let new_key = entry.cabin.key();

        if changed {
            self.pipeline_cache.forget(old_key);
            self.codec.cleanup(old_key);
        }

        registry.insert(new_key.clone(), entry);
        Ok(new_key)
    }

    /// Legacy entry point: starts a cabin that was created but not yet
    /// running. Idempotent.
    pub fn start_cabin(&self, cabin_key: &CabinKey) -> Result<()> {
        let registry = self.registry.lock();
        let entry = registry.get(cabin_key).ok_or_else(|| CabinError::NotFound(cabin_key.clone()))?;
        if !entry.cabin.is_running() {
            entry.cabin.set_running(true);
        }
        Ok(())
    }

    /// Idempotent teardown: removes the registry entry, stops the worker,
    /// releases socket/port state, and drops the cabin's queue. Safe to
    /// call more than once for the same key.
    pub async fn destroy_cabin(
        &self,
        room_id: &RoomId,
        speaker_id: &SpeakerId,
        source_lang: &LanguageCode,
        target_lang: &LanguageCode,
    ) -> Result<()> {
        let key = CabinKey::new(
            room_id.clone(),
            speaker_id.clone(),
            source_lang.clone(),
            target_lang.clone(),
        );

        let entry = self.registry.lock().remove(&key);
        let Some(entry) = entry else {
            return Ok(());
        };

        entry.cabin.set_running(false);
        entry.cabin.drain_queue();

        match tokio::time::timeout(DESTROY_JOIN_TIMEOUT, entry.worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(cabin = %key, error = %e, "cabin worker task panicked during destroy"),
            Err(_) => warn!(cabin = %key, "cabin worker did not shut down within the destroy timeout"),
        }

        self.socket_hub.unregister(entry.cabin.registration_key());
        self.codec.cleanup(&key);
        self.pipeline_cache.forget(&key);

        info!(cabin = %key, "cabin destroyed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every cabin currently registered. Used by shutdown to
    /// drain cabins one by one without holding the registry lock across
    /// the async destroy calls.
    pub fn keys(&self) -> Vec<CabinKey> {
        self.registry.lock().keys().cloned().collect()
    }
}
