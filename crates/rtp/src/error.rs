use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtpError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported RTP version: {0}")]
    UnsupportedVersion(u8),

    #[error("header length {header_len} exceeds packet length {packet_len}")]
    HeaderExceedsPacket { header_len: usize, packet_len: usize },

    #[error("payload type {0} not in accepted set")]
    UnacceptedPayloadType(u8),
}

pub type Result<T> = std::result::Result<T, RtpError>;
