//! RTP header parsing and building.
//!
//! Wire format (RFC 3550 section 5.1), 12-byte fixed header plus optional
//! CSRC list and extension header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              SSRC                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::error::{Result, RtpError};

pub const FIXED_HEADER_LEN: usize = 12;

/// A parsed RTP packet. `payload` borrows from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: &'a [u8],
}

/// Parses an RTP packet, stripping CSRC list, extension header and
/// trailing padding from the returned payload slice.
pub fn parse(data: &[u8]) -> Result<RtpPacket<'_>> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(RtpError::TooShort(data.len()));
    }

    let b0 = data[0];
    let b1 = data[1];
    let version = (b0 >> 6) & 0x3;
    let padding = (b0 >> 5) & 0x1 == 1;
    let extension = (b0 >> 4) & 0x1 == 1;
    let cc = (b0 & 0xF) as usize;
    let marker = (b1 >> 7) & 0x1 == 1;
    let payload_type = b1 & 0x7F;
    let sequence = u16::from_be_bytes([data[2], data[3]]);
    let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    if version != 2 {
        return Err(RtpError::UnsupportedVersion(version));
    }

    let mut header_len = FIXED_HEADER_LEN + cc * 4;
    if header_len > data.len() {
        return Err(RtpError::HeaderExceedsPacket {
            header_len,
            packet_len: data.len(),
        });
    }

    if extension {
        if header_len + 4 > data.len() {
            return Err(RtpError::HeaderExceedsPacket {
                header_len: header_len + 4,
                packet_len: data.len(),
            });
        }
        let ext_len_words =
            u16::from_be_bytes([data[header_len + 2], data[header_len + 3]]) as usize;
        header_len += 4 + ext_len_words * 4;
        if header_len > data.len() {
            return Err(RtpError::HeaderExceedsPacket {
                header_len,
                packet_len: data.len(),
            });
        }
    }

    let mut payload_end = data.len();
    if padding && data.len() > header_len {
        let padding_len = data[data.len() - 1] as usize;
        if padding_len <= data.len() - header_len {
            payload_end -= padding_len;
        }
    }

    if header_len >= payload_end {
        return Err(RtpError::HeaderExceedsPacket {
            header_len,
            packet_len: payload_end,
        });
    }

    Ok(RtpPacket {
        version,
        padding,
        extension,
        marker,
        payload_type,
        sequence,
        timestamp,
        ssrc,
        payload: &data[header_len..payload_end],
    })
}

/// Extracts just the SSRC field (bytes 8..12) without fully parsing the
/// packet. Used by the socket hub's router, which must demux fast.
pub fn peek_ssrc(data: &[u8]) -> Result<u32> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(RtpError::TooShort(data.len()));
    }
    Ok(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Builds a minimal RTP packet: no padding, no extension, no CSRCs.
pub fn build(payload_type: u8, marker: bool, sequence: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FIXED_HEADER_LEN + payload.len());
    out.push(0x80); // V=2, P=0, X=0, CC=0
    out.push((if marker { 0x80 } else { 0x00 }) | (payload_type & 0x7F));
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(&ssrc.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_parse_round_trips_bit_exact() {
        let payload = b"opus-payload-bytes";
        let packet = build(100, false, 4242, 960_000, 0xDEAD_BEEF, payload);
        let parsed = parse(&packet).unwrap();
        assert_eq!(parsed.version, 2);
        assert!(!parsed.padding);
        assert!(!parsed.extension);
        assert!(!parsed.marker);
        assert_eq!(parsed.payload_type, 100);
        assert_eq!(parsed.sequence, 4242);
        assert_eq!(parsed.timestamp, 960_000);
        assert_eq!(parsed.ssrc, 0xDEAD_BEEF);
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn parse_rejects_short_packet() {
        let data = [0u8; 8];
        assert!(matches!(parse(&data), Err(RtpError::TooShort(8))));
    }

    #[test]
    fn parse_rejects_wrong_version() {
        let mut packet = build(100, false, 1, 1, 1, b"x");
        packet[0] = 0x40; // version 1
        assert!(matches!(parse(&packet), Err(RtpError::UnsupportedVersion(1))));
    }

    #[test]
    fn peek_ssrc_matches_full_parse() {
        let packet = build(100, false, 1, 1, 0x1234_5678, b"payload");
        assert_eq!(peek_ssrc(&packet).unwrap(), 0x1234_5678);
        assert_eq!(parse(&packet).unwrap().ssrc, 0x1234_5678);
    }

    #[test]
    fn parse_strips_csrc_list() {
        let mut packet = build(100, false, 1, 1, 1, b"payload");
        packet[0] = 0x82; // V=2, CC=2
        let mut with_csrc = packet[..FIXED_HEADER_LEN].to_vec();
        with_csrc.extend_from_slice(&[0u8; 8]); // two CSRCs
        with_csrc.extend_from_slice(&packet[FIXED_HEADER_LEN..]);
        let parsed = parse(&with_csrc).unwrap();
        assert_eq!(parsed.payload, b"payload");
    }

    #[test]
    fn parse_strips_padding() {
        let mut packet = build(100, false, 1, 1, 1, b"payload");
        packet[0] |= 0x20; // padding bit
        packet.push(0); // pad byte
        packet.push(0);
        *packet.last_mut().unwrap() = 2; // padding length = 2
        let parsed = parse(&packet).unwrap();
        assert_eq!(parsed.payload, b"payload");
    }

    #[test]
    fn marker_bit_round_trips() {
        let packet = build(111, true, 1, 1, 1, b"x");
        assert!(parse(&packet).unwrap().marker);
    }
}
