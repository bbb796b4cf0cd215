use crate::wire::FrameHeader;

use super::{protocol_error, FrameError};

pub const FLAG_END_HEADERS: u8 = 0x4;

/// CONTINUATION frame (RFC 7540 §6.10). Carries the next slice of a header
/// block that didn't fit in the preceding HEADERS/PUSH_PROMISE/CONTINUATION
/// frame; never appears on its own without a preceding header-block frame.
#[derive(Debug, PartialEq, Eq)]
pub struct Continuation<'a> {
    pub stream_id: u32,
    pub header_block_fragment: &'a [u8],
    pub end_headers: bool,
}

impl<'a> Continuation<'a> {
    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<Continuation<'a>, FrameError> {
        if header.stream_id == 0 {
            return Err(protocol_error());
        }
        Ok(Continuation {
            stream_id: header.stream_id,
            header_block_fragment: payload,
            end_headers: header.flags & FLAG_END_HEADERS != 0,
        })
    }

    /// The flags octet this frame would carry on the wire.
    pub fn flags(&self) -> u8 {
        if self.end_headers {
            FLAG_END_HEADERS
        } else {
            0
        }
    }

    /// Serializes the frame *payload* (the header block fragment); the
    /// caller prepends the 9-octet frame header using [`Continuation::flags`].
    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.header_block_fragment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream_id: u32, flags: u8, length: u32) -> FrameHeader {
        FrameHeader {
            length,
            kind: 0x9,
            flags,
            stream_id,
        }
    }

    #[test]
    fn parses_continuation() {
        let payload = b"\x84";
        let frame =
            Continuation::parse(header(1, FLAG_END_HEADERS, payload.len() as u32), payload)
                .unwrap();
        assert_eq!(frame.header_block_fragment, payload);
        assert!(frame.end_headers);
    }

    #[test]
    fn rejects_stream_zero() {
        assert!(Continuation::parse(header(0, 0, 0), b"").is_err());
    }

    #[test]
    fn emit_round_trips() {
        let frame = Continuation {
            stream_id: 1,
            header_block_fragment: b"\x84",
            end_headers: true,
        };
        let mut out = Vec::new();
        frame.emit(&mut out);
        let parsed =
            Continuation::parse(header(1, frame.flags(), out.len() as u32), &out).unwrap();
        assert_eq!(parsed, frame);
    }
}
