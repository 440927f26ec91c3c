//! Runs a single audio window through speech-to-text, translation and
//! text-to-speech, and tracks which language pair each cabin is currently
//! wired for so a language change invalidates the right bookkeeping.

use crate::collaborators::{SpeechToText, TextToSpeech, Translator};
use crate::voice_clone::VoiceCloneStore;
use dashmap::DashMap;
use relay_core::{CabinKey, LanguageCode, RoomId, SpeakerId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of running one audio window through the pipeline.
pub enum PipelineOutcome {
    /// The window contained no recognizable speech; nothing to emit.
    NoSpeech,
    /// Speech was recognized, translated and synthesized.
    Translated {
        text: String,
        pcm: Vec<i16>,
        sample_rate: u32,
    },
    /// A collaborator call failed; the window is dropped.
    Failed { reason: String },
}

pub struct TranslationPipeline {
    stt: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    tts: Arc<dyn TextToSpeech>,
    voice_store: Option<Arc<VoiceCloneStore>>,
}

impl TranslationPipeline {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        tts: Arc<dyn TextToSpeech>,
        voice_store: Option<Arc<VoiceCloneStore>>,
    ) -> Self {
        Self {
            stt,
            translator,
            tts,
            voice_store,
        }
    }

    pub async fn process(
        &self,
        pcm_window: &[i16],
        sample_rate: u32,
        source: &LanguageCode,
        target: &LanguageCode,
        speaker_id: &SpeakerId,
        room_id: &RoomId,
    ) -> PipelineOutcome {
        let wav = match relay_audio::wav::pcm_to_wav_bytes(pcm_window, sample_rate, 1) {
            Ok(wav) => wav,
            Err(e) => return PipelineOutcome::Failed { reason: e.to_string() },
        };

        let transcript = match self.stt.transcribe(&wav, source).await {
            Ok(text) => text,
            Err(e) => return PipelineOutcome::Failed { reason: e.to_string() },
        };

        if transcript.trim().is_empty() {
            return PipelineOutcome::NoSpeech;
        }

        let translated = if source == target {
            transcript.clone()
        } else {
            match self.translator.translate(&transcript, source, target).await {
                Ok(text) => text,
                Err(e) => return PipelineOutcome::Failed { reason: e.to_string() },
            }
        };

        let voice_embedding = self
            .voice_store
            .as_ref()
            .and_then(|store| store.embedding_for(speaker_id, room_id));

        match self
            .tts
            .synthesize(&translated, target, speaker_id, room_id, voice_embedding.as_deref())
            .await
        {
            Ok(audio) => PipelineOutcome::Translated {
                text: translated,
                pcm: audio.pcm,
                sample_rate: audio.sample_rate,
            },
            Err(e) => PipelineOutcome::Failed { reason: e.to_string() },
        }
    }

    /// Synthesizes a single clause using the same voice-embedding lookup as
    /// `process`. Exposed so a caller can re-synthesize a long utterance
    /// clause-by-clause for lower perceived latency instead of using the
    /// single combined synthesis `process` already produced.
    pub async fn synthesize_clause(
        &self,
        text: &str,
        target: &LanguageCode,
        speaker_id: &SpeakerId,
        room_id: &RoomId,
    ) -> crate::error::Result<crate::collaborators::SynthesizedAudio> {
        let voice_embedding = self
            .voice_store
            .as_ref()
            .and_then(|store| store.embedding_for(speaker_id, room_id));
        self.tts
            .synthesize(text, target, speaker_id, room_id, voice_embedding.as_deref())
            .await
    }
}

/// Tracks which language pair each cabin's pipeline was last invoked with.
/// A cabin that changes its source or target language invalidates its
/// entry; the caller is expected to treat that as "reset per-language
/// state" even though the underlying `TranslationPipeline` itself is
/// stateless and shared across all cabins.
pub struct PipelineCache {
    pipeline: Arc<TranslationPipeline>,
    active_pairs: DashMap<CabinKey, (LanguageCode, LanguageCode)>,
}

impl PipelineCache {
    pub fn new(pipeline: Arc<TranslationPipeline>) -> Self {
        Self {
            pipeline,
            active_pairs: DashMap::new(),
        }
    }

    /// Returns the shared pipeline, noting (and logging) when the cabin's
    /// language pair has changed since the last call.
    pub fn get_or_create(
        &self,
        cabin_key: &CabinKey,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Arc<TranslationPipeline> {
        let wanted = (source.clone(), target.clone());
        match self.active_pairs.get(cabin_key) {
            Some(current) if *current == wanted => {
                debug!(cabin = %cabin_key, "reusing pipeline for unchanged language pair");
            }
            Some(current) => {
                warn!(
                    cabin = %cabin_key,
                    from = %format!("{}->{}", current.0, current.1),
                    to = %format!("{}->{}", wanted.0, wanted.1),
                    "cabin language pair changed, invalidating cached pair"
                );
                self.active_pairs.insert(cabin_key.clone(), wanted);
            }
            None => {
                self.active_pairs.insert(cabin_key.clone(), wanted);
            }
        }
        self.pipeline.clone()
    }

    pub fn forget(&self, cabin_key: &CabinKey) {
        self.active_pairs.remove(cabin_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SynthesizedAudio;
    use crate::error::Result as PipelineResult;
    use async_trait::async_trait;

    struct EchoStt;
    #[async_trait]
    impl SpeechToText for EchoStt {
        async fn transcribe(&self, wav: &[u8], _language: &LanguageCode) -> PipelineResult<String> {
            if wav.len() < 100 {
                Ok(String::new())
            } else {
                Ok("hello there".to_string())
            }
        }
    }

    struct UppercaseTranslator;
    #[async_trait]
    impl Translator for UppercaseTranslator {
        async fn translate(&self, text: &str, _source: &LanguageCode, _target: &LanguageCode) -> PipelineResult<String> {
            Ok(text.to_uppercase())
        }
    }

    struct FixedTts;
    #[async_trait]
    impl TextToSpeech for FixedTts {
        async fn synthesize(
            &self,
            text: &str,
            _target: &LanguageCode,
            _speaker_id: &SpeakerId,
            _room_id: &RoomId,
            _voice_embedding: Option<&[f32]>,
        ) -> PipelineResult<SynthesizedAudio> {
            Ok(SynthesizedAudio {
                pcm: vec![0i16; text.len()],
                sample_rate: 22_050,
            })
        }
    }

    fn pipeline() -> TranslationPipeline {
        TranslationPipeline::new(Arc::new(EchoStt), Arc::new(UppercaseTranslator), Arc::new(FixedTts), None)
    }

    #[tokio::test]
    async fn silent_window_produces_no_speech() {
        let p = pipeline();
        let outcome = p
            .process(
                &[0i16; 10],
                16_000,
                &LanguageCode::new("en"),
                &LanguageCode::new("es"),
                &SpeakerId::new("spk"),
                &RoomId::new("room"),
            )
            .await;
        assert!(matches!(outcome, PipelineOutcome::NoSpeech));
    }

    #[tokio::test]
    async fn speech_window_is_translated_and_synthesized() {
        let p = pipeline();
        let outcome = p
            .process(
                &[1000i16; 8000],
                16_000,
                &LanguageCode::new("en"),
                &LanguageCode::new("es"),
                &SpeakerId::new("spk"),
                &RoomId::new("room"),
            )
            .await;
        match outcome {
            PipelineOutcome::Translated { text, pcm, sample_rate } => {
                assert_eq!(text, "HELLO THERE");
                assert_eq!(sample_rate, 22_050);
                assert_eq!(pcm.len(), text.len());
            }
            _ => panic!("expected translated outcome"),
        }
    }

    #[tokio::test]
    async fn same_language_pair_skips_translation_call() {
        let p = pipeline();
        let outcome = p
            .process(
                &[1000i16; 8000],
                16_000,
                &LanguageCode::new("en"),
                &LanguageCode::new("en"),
                &SpeakerId::new("spk"),
                &RoomId::new("room"),
            )
            .await;
        match outcome {
            PipelineOutcome::Translated { text, .. } => assert_eq!(text, "hello there"),
            _ => panic!("expected translated outcome"),
        }
    }

    #[test]
    fn cache_tracks_language_pair_changes() {
        let cache = PipelineCache::new(Arc::new(pipeline()));
        let key = CabinKey::new(
            RoomId::new("room"),
            SpeakerId::new("spk"),
            LanguageCode::new("en"),
            LanguageCode::new("es"),
        );
        cache.get_or_create(&key, &LanguageCode::new("en"), &LanguageCode::new("es"));
        assert_eq!(
            *cache.active_pairs.get(&key).unwrap(),
            (LanguageCode::new("en"), LanguageCode::new("es"))
        );
        cache.get_or_create(&key, &LanguageCode::new("en"), &LanguageCode::new("fr"));
        assert_eq!(
            *cache.active_pairs.get(&key).unwrap(),
            (LanguageCode::new("en"), LanguageCode::new("fr"))
        );
        cache.forget(&key);
        assert!(cache.active_pairs.get(&key).is_none());
    }
}
