use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;

/// PUSH_PROMISE frame (RFC 7540 §6.6).
#[derive(Debug, PartialEq, Eq)]
pub struct PushPromise<'a> {
    pub stream_id: u32,
    pub promised_stream_id: u32,
    pub header_block_fragment: &'a [u8],
    pub end_headers: bool,
    pub pad_len: u8,
}

impl<'a> PushPromise<'a> {
    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<PushPromise<'a>, FrameError> {
        if header.stream_id == 0 {
            return Err(protocol_error());
        }

        let padded = header.flags & FLAG_PADDED != 0;
        let mut rest = payload;
        let mut pad_len = 0u8;

        if padded {
            if rest.is_empty() {
                return Err(frame_size_error());
            }
            pad_len = rest[0];
            rest = &rest[1..];
        }

        if rest.len() < 4 {
            return Err(frame_size_error());
        }
        let raw = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let promised_stream_id = raw & 0x7FFF_FFFF;
        rest = &rest[4..];

        // RFC 7540 §6.6: padding the length of the payload or greater is
        // PROTOCOL_ERROR, matching DATA (§6.1) and HEADERS (§6.2).
        if pad_len as usize > rest.len() {
            return Err(protocol_error());
        }
        let fragment = &rest[..rest.len() - pad_len as usize];

        Ok(PushPromise {
            stream_id: header.stream_id,
            promised_stream_id,
            header_block_fragment: fragment,
            end_headers: header.flags & FLAG_END_HEADERS != 0,
            pad_len,
        })
    }

    /// The flags octet this frame would carry on the wire.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.end_headers {
            flags |= FLAG_END_HEADERS;
        }
        if self.pad_len > 0 {
            flags |= FLAG_PADDED;
        }
        flags
    }

    /// Serializes the frame *payload* (optional pad-length octet, the
    /// promised stream id, the header block fragment, and padding) into
    /// `out`; the caller prepends the 9-octet frame header using
    /// [`PushPromise::flags`].
    pub fn emit(&self, out: &mut Vec<u8>) {
        if self.pad_len > 0 {
            out.push(self.pad_len);
        }
        out.extend_from_slice(&(self.promised_stream_id & 0x7FFF_FFFF).to_be_bytes());
        out.extend_from_slice(self.header_block_fragment);
        out.extend(std::iter::repeat(0u8).take(self.pad_len as usize));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream_id: u32, flags: u8, length: u32) -> FrameHeader {
        FrameHeader {
            length,
            kind: 0x5,
            flags,
            stream_id,
        }
    }

    #[test]
    fn parses_push_promise() {
        let mut payload = (2u32).to_be_bytes().to_vec();
        payload.extend_from_slice(b"\x82\x86");
        let frame = PushPromise::parse(
            header(1, FLAG_END_HEADERS, payload.len() as u32),
            &payload,
        )
        .unwrap();
        assert_eq!(frame.promised_stream_id, 2);
        assert_eq!(frame.header_block_fragment, b"\x82\x86");
        assert!(frame.end_headers);
    }

    #[test]
    fn parses_padded_push_promise() {
        let mut payload = vec![1u8];
        payload.extend_from_slice(&(4u32).to_be_bytes());
        payload.push(b'X');
        payload.push(0);
        let frame = PushPromise::parse(header(3, FLAG_PADDED, payload.len() as u32), &payload)
            .unwrap();
        assert_eq!(frame.promised_stream_id, 4);
        assert_eq!(frame.header_block_fragment, b"X");
    }

    #[test]
    fn rejects_stream_zero() {
        let payload = (0u32).to_be_bytes();
        assert!(PushPromise::parse(header(0, 0, 4), &payload).is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        assert!(PushPromise::parse(header(1, 0, 2), &[0, 0]).is_err());
    }

    #[test]
    fn emit_round_trips_with_padding() {
        let frame = PushPromise {
            stream_id: 1,
            promised_stream_id: 2,
            header_block_fragment: b"\x82\x86",
            end_headers: true,
            pad_len: 3,
        };
        let mut out = Vec::new();
        frame.emit(&mut out);
        let parsed =
            PushPromise::parse(header(1, frame.flags(), out.len() as u32), &out).unwrap();
        assert_eq!(parsed, frame);
    }
}
