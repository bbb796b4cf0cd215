use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

/// WINDOW_UPDATE frame (RFC 7540 §6.9). Always exactly 4 octets; the high bit
/// of the increment is reserved and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    pub stream_id: u32,
    pub increment: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: u32, increment: u32) -> Self {
        WindowUpdate {
            stream_id,
            increment,
        }
    }

    pub fn parse(header: FrameHeader, payload: &[u8]) -> Result<WindowUpdate, FrameError> {
        if header.length != 4 {
            return Err(frame_size_error());
        }
        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let increment = raw & 0x7FFF_FFFF;
        // spec §5.2 "a WINDOW_UPDATE increment of zero MUST be rejected".
        if increment == 0 {
            return Err(protocol_error());
        }
        Ok(WindowUpdate {
            stream_id: header.stream_id,
            increment,
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.increment & 0x7FFF_FFFF).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream_id: u32, length: u32) -> FrameHeader {
        FrameHeader {
            length,
            kind: 0x8,
            flags: 0,
            stream_id,
        }
    }

    #[test]
    fn round_trips() {
        let frame = WindowUpdate::new(5, 65_535);
        let mut out = Vec::new();
        frame.emit(&mut out);
        let parsed = WindowUpdate::parse(header(5, 4), &out).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn rejects_zero_increment() {
        assert!(WindowUpdate::parse(header(0, 4), &[0; 4]).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(WindowUpdate::parse(header(1, 3), &[0; 3]).is_err());
    }
}
