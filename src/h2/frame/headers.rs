use crate::wire::FrameHeader;

use super::{parse_headers_prefix, protocol_error, FrameError};

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

/// The optional RFC 7540 §6.2 priority prefix carried by HEADERS when the
/// PRIORITY flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDependency {
    pub parent_stream_id: u32,
    pub weight: u8,
    pub exclusive: bool,
}

/// HEADERS frame (RFC 7540 §6.2). `header_block_fragment` is the
/// HPACK-encoded bytes, not yet decoded -- decoding happens once all
/// CONTINUATION frames (if any) have been appended.
#[derive(Debug, PartialEq, Eq)]
pub struct Headers<'a> {
    pub stream_id: u32,
    pub header_block_fragment: &'a [u8],
    pub end_stream: bool,
    pub end_headers: bool,
    pub priority: Option<StreamDependency>,
    pub pad_len: u8,
}

impl<'a> Headers<'a> {
    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<Headers<'a>, FrameError> {
        if header.stream_id == 0 {
            return Err(protocol_error());
        }

        let padded = header.flags & FLAG_PADDED != 0;
        let priority = header.flags & FLAG_PRIORITY != 0;
        let (pad_len, dependency, fragment) = parse_headers_prefix(payload, padded, priority)?;

        Ok(Headers {
            stream_id: header.stream_id,
            header_block_fragment: fragment,
            end_stream: header.flags & FLAG_END_STREAM != 0,
            end_headers: header.flags & FLAG_END_HEADERS != 0,
            priority: dependency,
            pad_len,
        })
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    /// The flags octet this frame would carry on the wire.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.end_stream {
            flags |= FLAG_END_STREAM;
        }
        if self.end_headers {
            flags |= FLAG_END_HEADERS;
        }
        if self.pad_len > 0 {
            flags |= FLAG_PADDED;
        }
        if self.priority.is_some() {
            flags |= FLAG_PRIORITY;
        }
        flags
    }

    /// Serializes the frame *payload* (optional PADDED/PRIORITY prefix, the
    /// header block fragment, then `pad_len` zero bytes) into `out`; the
    /// caller prepends the 9-octet frame header using [`Headers::flags`].
    pub fn emit(&self, out: &mut Vec<u8>) {
        if self.pad_len > 0 {
            out.push(self.pad_len);
        }
        if let Some(dep) = &self.priority {
            let mut raw = dep.parent_stream_id & 0x7FFF_FFFF;
            if dep.exclusive {
                raw |= 0x8000_0000;
            }
            out.extend_from_slice(&raw.to_be_bytes());
            out.push(dep.weight);
        }
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
            kind: 0x1,
            flags,
            stream_id,
        }
    }

    #[test]
    fn parses_plain_headers() {
        let payload = b"\x82\x86\x84";
        let frame = Headers::parse(
            header(1, FLAG_END_HEADERS | FLAG_END_STREAM, payload.len() as u32),
            payload,
        )
        .unwrap();
        assert_eq!(frame.header_block_fragment, payload);
        assert!(frame.end_stream && frame.end_headers);
        assert!(frame.priority.is_none());
    }

    #[test]
    fn parses_padded_and_prioritized_headers() {
        // pad_len=1, dependency (exclusive, parent=3, weight=10), fragment "A", 1 pad byte.
        let mut payload = vec![1u8];
        payload.extend_from_slice(&(0x8000_0003u32).to_be_bytes());
        payload.push(10);
        payload.push(b'A');
        payload.push(0);

        let frame = Headers::parse(
            header(5, FLAG_PADDED | FLAG_PRIORITY, payload.len() as u32),
            &payload,
        )
        .unwrap();
        assert_eq!(frame.header_block_fragment, b"A");
        let dep = frame.priority.unwrap();
        assert!(dep.exclusive);
        assert_eq!(dep.parent_stream_id, 3);
        assert_eq!(dep.weight, 10);
    }

    #[test]
    fn rejects_stream_zero() {
        assert!(Headers::parse(header(0, FLAG_END_HEADERS, 0), b"").is_err());
    }

    #[test]
    fn emit_round_trips_with_priority_and_padding() {
        let frame = Headers {
            stream_id: 9,
            header_block_fragment: b"\x82\x86\x84",
            end_stream: true,
            end_headers: true,
            priority: Some(StreamDependency {
                parent_stream_id: 3,
                weight: 10,
                exclusive: true,
            }),
            pad_len: 2,
        };
        let mut out = Vec::new();
        frame.emit(&mut out);
        let parsed = Headers::parse(header(9, frame.flags(), out.len() as u32), &out).unwrap();
        assert_eq!(parsed, frame);
    }
}
