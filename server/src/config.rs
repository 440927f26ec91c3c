//! Server configuration.
//!
//! Loaded from a TOML file, then overridden field-by-field from environment
//! variables (matching the env-var names the original audio/semantic/chatbot
//! services used). All fields have sane defaults, so the relay is runnable
//! with no configuration file at all.

use serde::{Deserialize, Serialize};

/// Full relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// gRPC listen ports for the three services this binary hosts.
    pub grpc: GrpcConfig,
    /// RTP/translation-port allocation range handed out per cabin.
    pub ports: PortConfig,
    /// SFU/mediasoup coordinates the relay reports RTP endpoints back to.
    pub sfu: SfuConfig,
    /// Qdrant-backed transcript vector store.
    pub qdrant: QdrantConfig,
    /// Base URLs for the black-box STT/NMT/TTS/embedding/answerer services.
    pub collaborators: CollaboratorsConfig,
    /// Logging.
    pub logging: LoggingConfig,
    /// `/metrics` and `/health` HTTP endpoints.
    pub observability: ObservabilityConfig,
}

/// gRPC listen ports. Defaults match the original services' env-var defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    pub audio_port: u16,
    pub semantic_port: u16,
    pub chatbot_port: u16,
    pub bind_address: String,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            audio_port: 30005,
            semantic_port: 30006,
            chatbot_port: 30007,
            bind_address: "0.0.0.0".into(),
        }
    }
}

/// Range of UDP ports the port allocator may hand out for translated RTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub min: u16,
    pub max: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            min: 40000,
            max: 40400,
        }
    }
}

/// Coordinates for the SFU/mediasoup worker this relay serves RTP to/from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SfuConfig {
    pub mediasoup_worker_host: String,
    pub mediasoup_worker_port: u16,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            mediasoup_worker_host: "127.0.0.1".into(),
            mediasoup_worker_port: 40100,
        }
    }
}

/// Connection details for the transcript vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_name: String,
    pub max_search_results: u32,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            api_key: None,
            collection_name: "conversations".into(),
            max_search_results: 10,
        }
    }
}

/// Base URLs for the external ML services the pipeline and chatbot call.
/// Their wire contract is a plain JSON POST of the request fields and a
/// JSON response with the matching output field; none of these services
/// ship with this relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub stt_url: String,
    pub translation_url: String,
    pub tts_url: String,
    pub voice_embedding_url: String,
    pub text_embedding_url: String,
    pub answerer_url: String,
    pub request_timeout_secs: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            stt_url: "http://localhost:8101/transcribe".into(),
            translation_url: "http://localhost:8102/translate".into(),
            tts_url: "http://localhost:8103/synthesize".into(),
            voice_embedding_url: "http://localhost:8104/embed-voice".into(),
            text_embedding_url: "http://localhost:8105/embed-text".into(),
            answerer_url: "http://localhost:8106/answer".into(),
            request_timeout_secs: 30,
        }
    }
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Bind address for the Prometheus/health HTTP endpoints, separate from the
/// three gRPC services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 9100,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file, falling back to defaults if the
    /// file is absent, then applies environment-variable overrides on top.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("config error in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(pfad, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("config file '{pfad}' unreadable: {e}")),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_u16("AUDIO_GRPC_PORT") {
            self.grpc.audio_port = v;
        }
        if let Some(v) = env_u16("SEMANTIC_GRPC_PORT") {
            self.grpc.semantic_port = v;
        }
        if let Some(v) = env_u16("CHATBOT_GRPC_PORT") {
            self.grpc.chatbot_port = v;
        }
        if let Some(v) = env_u16("AUDIO_PORT_MIN") {
            self.ports.min = v;
        }
        if let Some(v) = env_u16("AUDIO_PORT_MAX") {
            self.ports.max = v;
        }
        if let Ok(v) = std::env::var("MEDIASOUP_WORKER_HOST") {
            self.sfu.mediasoup_worker_host = v;
        }
        if let Some(v) = env_u16("MEDIASOUP_WORKER_PORT") {
            self.sfu.mediasoup_worker_port = v;
        }
        if let Ok(v) = std::env::var("URL_QDRANT") {
            self.qdrant.url = normalize_qdrant_url(&v);
        }
        if let Ok(v) = std::env::var("API_KEY_QDRANT") {
            if !v.is_empty() {
                self.qdrant.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("COLLECTION_NAME") {
            self.qdrant.collection_name = v;
        }
        if let Some(v) = std::env::var("MAX_SEARCH_RESULTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.qdrant.max_search_results = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("STT_SERVICE_URL") {
            self.collaborators.stt_url = v;
        }
        if let Ok(v) = std::env::var("TRANSLATION_SERVICE_URL") {
            self.collaborators.translation_url = v;
        }
        if let Ok(v) = std::env::var("TTS_SERVICE_URL") {
            self.collaborators.tts_url = v;
        }
        if let Ok(v) = std::env::var("VOICE_EMBEDDING_SERVICE_URL") {
            self.collaborators.voice_embedding_url = v;
        }
        if let Ok(v) = std::env::var("TEXT_EMBEDDING_SERVICE_URL") {
            self.collaborators.text_embedding_url = v;
        }
        if let Ok(v) = std::env::var("ANSWERER_SERVICE_URL") {
            self.collaborators.answerer_url = v;
        }
        if let Some(v) = env_u16("OBSERVABILITY_PORT") {
            self.observability.port = v;
        }
    }

    pub fn audio_grpc_bind_address(&self) -> String {
        format!("{}:{}", self.grpc.bind_address, self.grpc.audio_port)
    }

    pub fn semantic_grpc_bind_address(&self) -> String {
        format!("{}:{}", self.grpc.bind_address, self.grpc.semantic_port)
    }

    pub fn chatbot_grpc_bind_address(&self) -> String {
        format!("{}:{}", self.grpc.bind_address, self.grpc.chatbot_port)
    }

    pub fn observability_bind_address(&self) -> String {
        format!("{}:{}", self.observability.bind_address, self.observability.port)
    }
}

fn env_u16(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// `URL_QDRANT` in the original services has no scheme (e.g. "localhost:6333");
/// the HTTP client needs one.
fn normalize_qdrant_url(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.grpc.audio_port, 30005);
        assert_eq!(cfg.grpc.semantic_port, 30006);
        assert_eq!(cfg.grpc.chatbot_port, 30007);
        assert_eq!(cfg.ports.min, 40000);
        assert_eq!(cfg.ports.max, 40400);
        assert_eq!(cfg.qdrant.collection_name, "conversations");
        assert_eq!(cfg.qdrant.max_search_results, 10);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.observability.port, 9100);
    }

    #[test]
    fn bind_addresses() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.audio_grpc_bind_address(), "0.0.0.0:30005");
        assert_eq!(cfg.semantic_grpc_bind_address(), "0.0.0.0:30006");
        assert_eq!(cfg.chatbot_grpc_bind_address(), "0.0.0.0:30007");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
            [grpc]
            audio_port = 9000

            [ports]
            min = 50000
            max = 50100
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.grpc.audio_port, 9000);
        assert_eq!(cfg.ports.min, 50000);
        assert_eq!(cfg.ports.max, 50100);
        // Fields not present keep their defaults.
        assert_eq!(cfg.grpc.semantic_port, 30006);
    }

    #[test]
    fn qdrant_url_normalization_adds_scheme() {
        assert_eq!(normalize_qdrant_url("localhost:6333"), "http://localhost:6333");
        assert_eq!(
            normalize_qdrant_url("https://cloud.qdrant.io"),
            "https://cloud.qdrant.io"
        );
    }
}
