//! Identity types shared across the relay.
//!
//! Newtypes keep room, speaker and language identifiers from being
//! interchanged at compile time even though several of them wrap a plain
//! `String`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a conference room. Must be a canonical UUID wherever it
/// crosses the semantic-indexing boundary; the audio control surface
/// accepts any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id as a UUID. Used by the semantic layer, where a
    /// `room_key` must be a canonical UUID.
    pub fn as_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the speaker a cabin was created for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeakerId(pub String);

impl SpeakerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A BCP-47-ish language tag, e.g. "vi", "en". No validation is performed
/// here; the STT/NMT/TTS collaborators own interpretation of the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageCode(pub String);

impl LanguageCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single translation cabin: one (room, speaker, source
/// language, target language) flow. Renaming a cabin (language update)
/// produces a new `CabinKey` with the same room/speaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CabinKey {
    pub room_id: RoomId,
    pub speaker_id: SpeakerId,
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
}

impl CabinKey {
    pub fn new(room_id: RoomId, speaker_id: SpeakerId, source_lang: LanguageCode, target_lang: LanguageCode) -> Self {
        Self {
            room_id,
            speaker_id,
            source_lang,
            target_lang,
        }
    }

    /// Matches the upstream `f"{room_id}_{user_id}_{source_language}_{target_language}"`
    /// composite key, used only for logging/debugging; equality and hashing
    /// use the struct fields directly.
    pub fn as_string(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.room_id, self.speaker_id, self.source_lang, self.target_lang
        )
    }

    /// True if this key refers to the same (room, speaker) pair as `other`,
    /// ignoring the language pair. Used by `find_cabin_by_user`.
    pub fn same_speaker(&self, room_id: &RoomId, speaker_id: &SpeakerId) -> bool {
        &self.room_id == room_id && &self.speaker_id == speaker_id
    }
}

impl fmt::Display for CabinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Derives the synthetic SSRC a cabin is routed under, matching the
/// upstream's `hash(cabin_id) & 0xFFFFFFFF` derivation using a stable
/// (non-randomized) hash so the same key always yields the same SSRC
/// across restarts.
pub fn deterministic_ssrc(key: &CabinKey) -> u32 {
    fnv1a32(key.as_string().as_bytes())
}

fn fnv1a32(bytes: &[u8]) -> u32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(room: &str, speaker: &str, src: &str, tgt: &str) -> CabinKey {
        CabinKey::new(
            RoomId::new(room),
            SpeakerId::new(speaker),
            LanguageCode::new(src),
            LanguageCode::new(tgt),
        )
    }

    #[test]
    fn cabin_key_display_matches_composite_format() {
        let k = key("R1", "U1", "vi", "en");
        assert_eq!(k.as_string(), "R1_U1_vi_en");
        assert_eq!(k.to_string(), "R1_U1_vi_en");
    }

    #[test]
    fn ssrc_is_deterministic() {
        let k = key("R1", "U1", "vi", "en");
        let a = deterministic_ssrc(&k);
        let b = deterministic_ssrc(&k);
        assert_eq!(a, b);
    }

    #[test]
    fn ssrc_differs_for_different_keys() {
        let a = deterministic_ssrc(&key("R1", "U1", "vi", "en"));
        let b = deterministic_ssrc(&key("R1", "U1", "en", "vi"));
        assert_ne!(a, b);
    }

    #[test]
    fn same_speaker_ignores_language_pair() {
        let k = key("R1", "U1", "vi", "en");
        assert!(k.same_speaker(&RoomId::new("R1"), &SpeakerId::new("U1")));
        assert!(!k.same_speaker(&RoomId::new("R1"), &SpeakerId::new("U2")));
    }

    #[test]
    fn room_id_parses_uuid() {
        let valid = RoomId::new("550e8400-e29b-41d4-a716-446655440000");
        assert!(valid.as_uuid().is_some());
        let invalid = RoomId::new("not-a-uuid");
        assert!(invalid.as_uuid().is_none());
    }

    #[test]
    fn ids_are_serde_compatible() {
        let room = RoomId::new("R1");
        let json = serde_json::to_string(&room).unwrap();
        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(room, back);
    }
}
