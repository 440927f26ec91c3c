use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port available in range {lo}..={hi}")]
    RangeExhausted { lo: u16, hi: u16 },

    #[error("port {0} is not in the configured range")]
    OutOfRange(u16),
}

pub type Result<T> = std::result::Result<T, PortError>;
