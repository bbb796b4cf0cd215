use crate::h2::error::Reason;
use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

/// RST_STREAM frame (RFC 7540 §6.4). Always exactly 4 octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStream {
    pub stream_id: u32,
    reason: Reason,
}

impl RstStream {
    pub fn new(stream_id: u32, reason: Reason) -> Self {
        RstStream { stream_id, reason }
    }

    pub fn parse(header: FrameHeader, payload: &[u8]) -> Result<RstStream, FrameError> {
        if header.stream_id == 0 {
            return Err(protocol_error());
        }
        if header.length != 4 {
            return Err(frame_size_error());
        }
        let code = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Ok(RstStream {
            stream_id: header.stream_id,
            reason: Reason::new(code),
        })
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.reason.code().to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream_id: u32, length: u32) -> FrameHeader {
        FrameHeader {
            length,
            kind: 0x3,
            flags: 0,
            stream_id,
        }
    }

    #[test]
    fn round_trips() {
        let rst = RstStream::new(3, Reason::CANCEL);
        let mut out = Vec::new();
        rst.emit(&mut out);
        let parsed = RstStream::parse(header(3, 4), &out).unwrap();
        assert_eq!(parsed.reason(), Reason::CANCEL);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(RstStream::parse(header(1, 3), &[0; 3]).is_err());
    }
}
