//! relay-core: shared identity types. Each downstream crate (`relay-rtp`,
//! `relay-ports`, `relay-socket`, `relay-audio`, `relay-pipeline`,
//! `relay-semantic`, `relay-cabin`) defines its own `thiserror` enum rather
//! than funnelling everything through a single god-enum here: error
//! variants belong next to the code that raises them.

pub mod types;

pub use types::{deterministic_ssrc, CabinKey, LanguageCode, RoomId, SpeakerId};
