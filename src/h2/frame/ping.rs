use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

pub const FLAG_ACK: u8 = 0x1;

/// PING frame (RFC 7540 §6.7). Always exactly 8 octets of opaque data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: [u8; 8],
    pub ack: bool,
}

impl Ping {
    pub fn new(payload: [u8; 8], ack: bool) -> Self {
        Ping { payload, ack }
    }

    pub fn parse(header: FrameHeader, payload: &[u8]) -> Result<Ping, FrameError> {
        if header.stream_id != 0 {
            return Err(protocol_error());
        }
        if header.length != 8 {
            return Err(frame_size_error());
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);
        Ok(Ping {
            payload: buf,
            ack: header.flags & FLAG_ACK != 0,
        })
    }

    pub fn flags(&self) -> u8 {
        if self.ack {
            FLAG_ACK
        } else {
            0
        }
    }

    /// Serializes the fixed 8-octet opaque payload; the caller prepends the
    /// 9-octet frame header using [`Ping::flags`].
    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream_id: u32, flags: u8, length: u32) -> FrameHeader {
        FrameHeader {
            length,
            kind: 0x6,
            flags,
            stream_id,
        }
    }

    #[test]
    fn parses_ping() {
        let payload = [1, 2, 3, 4, 5, 6, 7, 8];
        let frame = Ping::parse(header(0, FLAG_ACK, 8), &payload).unwrap();
        assert_eq!(frame.payload, payload);
        assert!(frame.ack);
    }

    #[test]
    fn rejects_nonzero_stream_id() {
        assert!(Ping::parse(header(1, 0, 8), &[0; 8]).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Ping::parse(header(0, 0, 7), &[0; 7]).is_err());
    }

    #[test]
    fn emit_round_trips() {
        let frame = Ping::new([9; 8], false);
        let mut out = Vec::new();
        frame.emit(&mut out);
        let parsed = Ping::parse(header(0, frame.flags(), out.len() as u32), &out).unwrap();
        assert_eq!(parsed, frame);
    }
}
