//! End-to-end tests for cabin creation, language swap and the VAD
//! passthrough / translation paths, exercised through a real shared socket
//! hub bound to loopback rather than through the individual unit fakes each
//! sub-crate already covers in isolation.

use async_trait::async_trait;
use relay_audio::OpusCodecCache;
use relay_cabin::CabinManager;
use relay_core::{deterministic_ssrc, CabinKey, LanguageCode, RoomId, SpeakerId};
use relay_pipeline::{PipelineCache, Result as PipelineResult, SpeechToText, SynthesizedAudio, TextToSpeech, TranslationPipeline, Translator};
use relay_ports::{PortAllocator, PortRange};
use relay_socket::{SharedSocketHub, SocketHubConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

const STEREO_FRAME_SAMPLES: usize = 1920;

struct CountingStt {
    transcript: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SpeechToText for CountingStt {
    async fn transcribe(&self, _wav: &[u8], _language: &LanguageCode) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }
}

struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _source: &LanguageCode, _target: &LanguageCode) -> PipelineResult<String> {
        Ok(text.to_string())
    }
}

struct ShortTts;

#[async_trait]
impl TextToSpeech for ShortTts {
    async fn synthesize(
        &self,
        _text: &str,
        _target: &LanguageCode,
        _speaker_id: &SpeakerId,
        _room_id: &RoomId,
        _voice_embedding: Option<&[f32]>,
    ) -> PipelineResult<SynthesizedAudio> {
        Ok(SynthesizedAudio {
            pcm: vec![2000i16; 1600], // 100ms @ 16kHz mono
            sample_rate: 16_000,
        })
    }
}

async fn hub_and_ports(rx_port: u16) -> (Arc<SharedSocketHub>, Arc<PortAllocator>) {
    let ports = Arc::new(PortAllocator::new(PortRange::new(43000, 43100)));
    let config = SocketHubConfig {
        rx_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), rx_port),
        tx_source_port: None,
    };
    let hub = SharedSocketHub::bind(config, ports.clone()).await.unwrap();
    (Arc::new(hub), ports)
}

async fn manager_with_fakes(hub: Arc<SharedSocketHub>, transcript: &str, stt_calls: Arc<AtomicUsize>) -> Arc<CabinManager> {
    let stt: Arc<dyn SpeechToText> = Arc::new(CountingStt {
        transcript: transcript.to_string(),
        calls: stt_calls,
    });
    let pipeline = Arc::new(TranslationPipeline::new(
        stt,
        Arc::new(IdentityTranslator),
        Arc::new(ShortTts),
        None,
    ));
    Arc::new(CabinManager::new(
        hub,
        Arc::new(OpusCodecCache::new()),
        Arc::new(PipelineCache::new(pipeline)),
        None,
        None,
        "127.0.0.1".to_string(),
    ))
}

fn encode_constant_frame(codec: &OpusCodecCache, key: &CabinKey, amplitude: i16) -> Vec<u8> {
    let pcm = vec![amplitude; STEREO_FRAME_SAMPLES];
    codec.encode(key, &pcm).unwrap()
}

/// Sends `count` frames of 20ms, 48kHz stereo constant-amplitude audio as
/// inbound RTP, one every call (no real-time pacing on the inbound side).
async fn feed_constant_audio(sender: &UdpSocket, dest: SocketAddr, ssrc: u32, amplitude: i16, count: u32) {
    let encode_key = CabinKey::new(RoomId::new("encoder"), SpeakerId::new("encoder"), LanguageCode::new("x"), LanguageCode::new("y"));
    let codec = OpusCodecCache::new();
    let payload = encode_constant_frame(&codec, &encode_key, amplitude);

    for i in 0..count {
        let packet = relay_rtp::build(100, false, i as u16, i * 960, ssrc, &payload);
        sender.send_to(&packet, dest).await.unwrap();
    }
}

#[tokio::test]
async fn cabin_creation_assigns_deterministic_ssrc_and_registers_with_hub() {
    let (hub, _ports) = hub_and_ports(0).await;
    let manager = manager_with_fakes(hub.clone(), "hello", Arc::new(AtomicUsize::new(0))).await;

    let info = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();

    let expected_key = CabinKey::new(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"));
    assert_eq!(info.ssrc, deterministic_ssrc(&expected_key));
    assert_eq!(hub.registered_ssrc(&expected_key), Some(info.ssrc));
    assert_eq!(manager.len(), 1);

    manager
        .destroy_cabin(&RoomId::new("R1"), &SpeakerId::new("U1"), &LanguageCode::new("vi"), &LanguageCode::new("en"))
        .await
        .unwrap();
}

#[tokio::test]
async fn create_cabin_is_idempotent_for_the_same_key() {
    let (hub, _ports) = hub_and_ports(0).await;
    let manager = manager_with_fakes(hub, "hello", Arc::new(AtomicUsize::new(0))).await;

    let first = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();
    let second = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();

    assert_eq!(first.ssrc, second.ssrc);
    assert_eq!(first.rtp_port, second.rtp_port);
    assert_eq!(manager.len(), 1);
}

#[tokio::test]
async fn destroy_then_recreate_does_not_leak_ports() {
    let (hub, ports) = hub_and_ports(0).await;
    let manager = manager_with_fakes(hub, "hello", Arc::new(AtomicUsize::new(0))).await;

    let baseline = ports.stats().used;

    manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();
    manager
        .destroy_cabin(&RoomId::new("R1"), &SpeakerId::new("U1"), &LanguageCode::new("vi"), &LanguageCode::new("en"))
        .await
        .unwrap();
    assert_eq!(ports.stats().used, baseline);

    manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();
    assert_eq!(ports.stats().used, baseline + 2);

    manager
        .destroy_cabin(&RoomId::new("R1"), &SpeakerId::new("U1"), &LanguageCode::new("vi"), &LanguageCode::new("en"))
        .await
        .unwrap();
    assert_eq!(ports.stats().used, baseline);
}

#[tokio::test]
async fn language_swap_renames_registry_key_without_touching_hub_registration() {
    let (hub, _ports) = hub_and_ports(0).await;
    let manager = manager_with_fakes(hub.clone(), "hello", Arc::new(AtomicUsize::new(0))).await;

    let info = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), 0)
        .await
        .unwrap();
    let registered_count_before = hub.registered_count();

    let old_key = manager.find_cabin_by_user(&RoomId::new("R1"), &SpeakerId::new("U1")).unwrap();
    assert_eq!(hub.registered_ssrc(&old_key), Some(info.ssrc));

    let new_key = manager
        .update_cabin_languages(&old_key, LanguageCode::new("en"), LanguageCode::new("vi"))
        .await
        .unwrap();

    assert_eq!(new_key.source_lang, LanguageCode::new("en"));
    assert_eq!(new_key.target_lang, LanguageCode::new("vi"));
    assert_eq!(new_key.as_string(), "R1_U1_en_vi");

    // The hub registration was made once, under the original key, and a
    // language rename never re-registers: same count, same SSRC, still
    // reachable under the key it was registered with.
    assert_eq!(hub.registered_count(), registered_count_before);
    assert_eq!(hub.registered_ssrc(&old_key), Some(info.ssrc));
    assert_eq!(manager.len(), 1);
    let still_one_entry = manager.find_cabin_by_user(&RoomId::new("R1"), &SpeakerId::new("U1"));
    assert_eq!(still_one_entry, Some(new_key));

    manager
        .destroy_cabin(&RoomId::new("R1"), &SpeakerId::new("U1"), &LanguageCode::new("en"), &LanguageCode::new("vi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn vad_gate_passthrough_emits_without_a_pipeline_call() {
    let rx_port = 43201;
    let (hub, _ports) = hub_and_ports(rx_port).await;
    let stt_calls = Arc::new(AtomicUsize::new(0));
    let manager = manager_with_fakes(hub.clone(), "hello", stt_calls.clone()).await;

    let sfu_receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sfu_port = sfu_receiver.local_addr().unwrap().port();

    let info = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), sfu_port)
        .await
        .unwrap();

    let router = hub.spawn_router();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let rx_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), rx_port);

    // 2s init buffer + 1s window, at 20ms/frame: 150 frames of quiet audio
    // (mean abs amplitude 50, below the default 200 energy threshold).
    feed_constant_audio(&sender, rx_addr, info.ssrc, 50, 150).await;

    let mut buf = [0u8; 4096];
    let received = tokio::time::timeout(Duration::from_secs(3), sfu_receiver.recv_from(&mut buf)).await;
    assert!(received.is_ok(), "expected passthrough audio to be emitted to the SFU");

    // Give the worker a moment to finish emitting the whole utterance, then
    // confirm the pipeline (STT) was never invoked for a silent window.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(stt_calls.load(Ordering::SeqCst), 0);

    hub.shutdown();
    router.abort();
}

#[tokio::test]
async fn translation_happy_path_calls_pipeline_once_and_emits_monotonic_rtp() {
    let rx_port = 43202;
    let (hub, _ports) = hub_and_ports(rx_port).await;
    let stt_calls = Arc::new(AtomicUsize::new(0));
    let manager = manager_with_fakes(hub.clone(), "xin chao", stt_calls.clone()).await;

    let sfu_receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sfu_port = sfu_receiver.local_addr().unwrap().port();

    let info = manager
        .create_cabin(RoomId::new("R1"), SpeakerId::new("U1"), LanguageCode::new("vi"), LanguageCode::new("en"), sfu_port)
        .await
        .unwrap();

    let router = hub.spawn_router();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let rx_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), rx_port);

    // Constant non-zero amplitude has zero zero-crossings, so it clears the
    // VAD's energy and ZCR bars: loud enough and "flat" enough to count as
    // speech on every 20ms frame. Exactly 100 frames (2.0s) is the precise
    // point the sliding buffer warms up and emits its first (and, since no
    // further audio arrives, only) window.
    feed_constant_audio(&sender, rx_addr, info.ssrc, 3000, 100).await;

    let mut sequences = Vec::new();
    loop {
        let mut buf = [0u8; 4096];
        match tokio::time::timeout(Duration::from_millis(1500), sfu_receiver.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                let parsed = relay_rtp::parse(&buf[..len]).unwrap();
                sequences.push(parsed.sequence);
            }
            _ => break,
        }
    }

    assert!(!sequences.is_empty(), "expected at least one translated RTP packet");
    for pair in sequences.windows(2) {
        assert_eq!(pair[1], pair[0].wrapping_add(1), "sequence numbers must increase by exactly 1 per chunk");
    }

    assert_eq!(stt_calls.load(Ordering::SeqCst), 1, "exactly one pipeline call for one translated window");

    hub.shutdown();
    router.abort();
}
