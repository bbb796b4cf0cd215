use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_PADDED: u8 = 0x8;

/// DATA frame (RFC 7540 §6.1). `data` excludes the pad-length octet and the
/// padding itself; both are zero-copy slices into the caller's buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Data<'a> {
    pub stream_id: u32,
    pub data: &'a [u8],
    pub end_stream: bool,
    pub pad_len: u8,
}

impl<'a> Data<'a> {
    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<Data<'a>, FrameError> {
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
            // spec §3 "padding ≤ payload − 1 when PADDED": the pad length
            // must leave room for itself within the original payload.
            if pad_len as usize > rest.len() {
                return Err(protocol_error());
            }
        }

        let data = &rest[..rest.len() - pad_len as usize];

        Ok(Data {
            stream_id: header.stream_id,
            data,
            end_stream: header.flags & FLAG_END_STREAM != 0,
            pad_len,
        })
    }

    /// The flags octet this frame would carry on the wire.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.end_stream {
            flags |= FLAG_END_STREAM;
        }
        if self.pad_len > 0 {
            flags |= FLAG_PADDED;
        }
        flags
    }

    /// Serializes the frame *payload* (pad length octet, data, then
    /// `pad_len` zero bytes) into `out`; the caller prepends the 9-octet
    /// frame header using [`Data::flags`] and the payload length.
    pub fn emit(&self, out: &mut Vec<u8>) {
        if self.pad_len > 0 {
            out.push(self.pad_len);
        }
        out.extend_from_slice(self.data);
        out.extend(std::iter::repeat(0u8).take(self.pad_len as usize));
    }
}
