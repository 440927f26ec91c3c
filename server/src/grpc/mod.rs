//! gRPC service dispatchers wiring the generated proto traits to the
//! cabin/pipeline/semantic runtime.

pub mod audio;
pub mod chatbot;
pub mod semantic;

use crate::proto;

pub use proto::audio_service_server::AudioServiceServer;
pub use proto::chat_bot_service_server::ChatBotServiceServer;
pub use proto::semantic_service_server::SemanticServiceServer;

pub use audio::AudioServiceImpl;
pub use chatbot::ChatBotServiceImpl;
pub use semantic::SemanticServiceImpl;
