use std::fmt;

/// `Error` is terminal: only `CabinManager::destroy_cabin` clears a cabin
/// in that state, there is no automatic recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CabinStatus {
    Idle,
    Listening,
    Translating,
    Error,
}

impl fmt::Display for CabinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CabinStatus::Idle => "idle",
            CabinStatus::Listening => "listening",
            CabinStatus::Translating => "translating",
            CabinStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}
