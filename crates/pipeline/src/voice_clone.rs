//! Voice clone store: collects a speaker's audio until there is enough of
//! it to extract a usable voice embedding, then caches that embedding for
//! the TTS step to consult.
//!
//! Deliberately knows nothing about cabins: it is keyed only by
//! `(speaker_id, room_id)`, so the dependency graph is
//! cabin -> pipeline -> voice clone store, never the other way around.

use crate::collaborators::VoiceEmbedder;
use parking_lot::Mutex;
use relay_core::{RoomId, SpeakerId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CloneKey(SpeakerId, RoomId);

#[derive(Debug, Clone)]
pub struct VoiceCloneConfig {
    pub max_cache_entries: usize,
    pub cache_ttl: Duration,
    pub max_buffer_duration: Duration,
    pub consolidate_after: Duration,
    pub min_mean_amplitude: f32,
    pub max_clip_ratio: f32,
    pub sweep_interval: Duration,
}

impl Default for VoiceCloneConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: 50,
            cache_ttl: Duration::from_secs(1800),
            max_buffer_duration: Duration::from_secs(15),
            consolidate_after: Duration::from_secs(10),
            min_mean_amplitude: 200.0,
            max_clip_ratio: 0.05,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

struct CacheEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

pub struct VoiceCloneStore {
    embedder: Arc<dyn VoiceEmbedder>,
    config: VoiceCloneConfig,
    buffers: Mutex<HashMap<CloneKey, Vec<i16>>>,
    cache: Mutex<HashMap<CloneKey, CacheEntry>>,
    order: Mutex<VecDeque<CloneKey>>,
}

impl VoiceCloneStore {
    pub fn new(embedder: Arc<dyn VoiceEmbedder>, config: VoiceCloneConfig) -> Self {
        Self {
            embedder,
            config,
            buffers: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a chunk of mono PCM for the speaker and, once enough audio
    /// has accumulated, extracts and caches an embedding. Safe to call as
    /// a fire-and-forget task from the cabin's inbound RTP callback path.
    pub async fn collect(&self, speaker_id: SpeakerId, room_id: RoomId, sample_rate: u32, chunk: &[i16]) {
        let key = CloneKey(speaker_id, room_id);
        let max_samples = (self.config.max_buffer_duration.as_secs_f32() * sample_rate as f32) as usize;
        let trim_target = (max_samples as f32 * 0.7) as usize;

        let ready = {
            let mut buffers = self.buffers.lock();
            let buf = buffers.entry(key.clone()).or_default();
            buf.extend_from_slice(chunk);
            if buf.len() > max_samples {
                let drop_count = buf.len() - trim_target;
                buf.drain(0..drop_count.min(buf.len()));
            }
            let duration_secs = buf.len() as f32 / sample_rate as f32;
            duration_secs >= self.config.consolidate_after.as_secs_f32()
        };

        if ready {
            self.consolidate(&key, sample_rate).await;
        }
    }

    async fn consolidate(&self, key: &CloneKey, sample_rate: u32) {
        let pcm = match self.buffers.lock().get(key).cloned() {
            Some(pcm) => pcm,
            None => return,
        };

        if !self.passes_quality_gate(&pcm) {
            debug!("voice sample failed quality gate, skipping embedding extraction");
            return;
        }

        match self.embedder.extract_embedding(&pcm, sample_rate).await {
            Ok(embedding) => self.insert_embedding(key.clone(), embedding),
            Err(e) => warn!(error = %e, "voice embedding extraction failed"),
        }
    }

    fn passes_quality_gate(&self, pcm: &[i16]) -> bool {
        if pcm.is_empty() {
            return false;
        }
        let mean_abs: f64 = pcm.iter().map(|&s| f64::from(s.unsigned_abs())).sum::<f64>() / pcm.len() as f64;
        let clipped = pcm
            .iter()
            .filter(|&&s| s >= i16::MAX - 1 || s <= i16::MIN + 1)
            .count();
        let clip_ratio = clipped as f32 / pcm.len() as f32;
        mean_abs as f32 > self.config.min_mean_amplitude && clip_ratio < self.config.max_clip_ratio
    }

    fn insert_embedding(&self, key: CloneKey, embedding: Vec<f32>) {
        let mut cache = self.cache.lock();
        let mut order = self.order.lock();

        if !cache.contains_key(&key) && cache.len() >= self.config.max_cache_entries {
            if let Some(oldest) = order.pop_front() {
                cache.remove(&oldest);
            }
        }

        cache.insert(
            key.clone(),
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
        order.retain(|k| k != &key);
        order.push_back(key);
    }

    /// Returns a cached embedding if one exists and has not expired.
    pub fn embedding_for(&self, speaker_id: &SpeakerId, room_id: &RoomId) -> Option<Vec<f32>> {
        let key = CloneKey(speaker_id.clone(), room_id.clone());
        let mut cache = self.cache.lock();
        let entry = cache.get(&key)?;
        if entry.inserted_at.elapsed() > self.config.cache_ttl {
            cache.remove(&key);
            self.order.lock().retain(|k| k != &key);
            return None;
        }
        Some(entry.embedding.clone())
    }

    /// Sweeps expired cache entries. Intended to be called periodically by
    /// a background task.
    pub fn sweep_expired(&self) -> usize {
        let mut cache = self.cache.lock();
        let ttl = self.config.cache_ttl;
        let expired: Vec<CloneKey> = cache
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            cache.remove(key);
        }
        let mut order = self.order.lock();
        order.retain(|k| !expired.contains(k));
        expired.len()
    }

    /// Spawns a background task that calls `sweep_expired` on
    /// `config.sweep_interval`, for the lifetime of the returned handle.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = self.sweep_expired();
                if evicted > 0 {
                    debug!(evicted, "swept expired voice-clone cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as PipelineResult;
    use async_trait::async_trait;

    struct FakeEmbedder;

    #[async_trait]
    impl VoiceEmbedder for FakeEmbedder {
        async fn extract_embedding(&self, pcm: &[i16], _sample_rate: u32) -> PipelineResult<Vec<f32>> {
            Ok(vec![pcm.len() as f32])
        }
    }

    fn store(config: VoiceCloneConfig) -> VoiceCloneStore {
        VoiceCloneStore::new(Arc::new(FakeEmbedder), config)
    }

    #[tokio::test]
    async fn collecting_enough_loud_audio_produces_an_embedding() {
        let config = VoiceCloneConfig {
            consolidate_after: Duration::from_millis(100),
            ..Default::default()
        };
        let s = store(config);
        let speaker = SpeakerId::new("U1");
        let room = RoomId::new("R1");
        // 16kHz, 0.2s of loud audio exceeds the 100ms consolidate threshold.
        let chunk = vec![10_000i16; 3200];
        s.collect(speaker.clone(), room.clone(), 16_000, &chunk).await;
        assert!(s.embedding_for(&speaker, &room).is_some());
    }

    #[tokio::test]
    async fn quiet_audio_never_produces_an_embedding() {
        let config = VoiceCloneConfig {
            consolidate_after: Duration::from_millis(50),
            ..Default::default()
        };
        let s = store(config);
        let speaker = SpeakerId::new("U1");
        let room = RoomId::new("R1");
        let chunk = vec![5i16; 3200];
        s.collect(speaker.clone(), room.clone(), 16_000, &chunk).await;
        assert!(s.embedding_for(&speaker, &room).is_none());
    }

    #[test]
    fn cache_evicts_oldest_entry_beyond_capacity() {
        let config = VoiceCloneConfig {
            max_cache_entries: 2,
            ..Default::default()
        };
        let s = store(config);
        s.insert_embedding(CloneKey(SpeakerId::new("A"), RoomId::new("R")), vec![1.0]);
        s.insert_embedding(CloneKey(SpeakerId::new("B"), RoomId::new("R")), vec![2.0]);
        s.insert_embedding(CloneKey(SpeakerId::new("C"), RoomId::new("R")), vec![3.0]);

        assert!(s.embedding_for(&SpeakerId::new("A"), &RoomId::new("R")).is_none());
        assert!(s.embedding_for(&SpeakerId::new("B"), &RoomId::new("R")).is_some());
        assert!(s.embedding_for(&SpeakerId::new("C"), &RoomId::new("R")).is_some());
    }

    #[test]
    fn expired_entries_are_swept() {
        let config = VoiceCloneConfig {
            cache_ttl: Duration::from_millis(10),
            ..Default::default()
        };
        let s = store(config);
        s.insert_embedding(CloneKey(SpeakerId::new("A"), RoomId::new("R")), vec![1.0]);
        std::thread::sleep(Duration::from_millis(30));
        let removed = s.sweep_expired();
        assert_eq!(removed, 1);
        assert!(s.embedding_for(&SpeakerId::new("A"), &RoomId::new("R")).is_none());
    }

    #[tokio::test]
    async fn spawned_sweeper_evicts_without_a_manual_call() {
        let config = VoiceCloneConfig {
            cache_ttl: Duration::from_millis(10),
            sweep_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let s = Arc::new(store(config));
        s.insert_embedding(CloneKey(SpeakerId::new("A"), RoomId::new("R")), vec![1.0]);

        let sweeper = s.clone().spawn_sweeper();
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.abort();

        assert!(s.embedding_for(&SpeakerId::new("A"), &RoomId::new("R")).is_none());
    }
}
