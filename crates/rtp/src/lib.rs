//! relay-rtp: RTP header parsing/building and per-cabin outbound stream state.

pub mod error;
pub mod header;
pub mod outbound;

pub use error::{Result, RtpError};
pub use header::{build, parse, peek_ssrc, RtpPacket, FIXED_HEADER_LEN};
pub use outbound::{OutboundRtpState, CLOCK_RATE, SAMPLES_PER_FRAME};
