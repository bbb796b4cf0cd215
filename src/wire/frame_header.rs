/// Length in octets of the fixed HTTP/2 frame header (RFC 7540 §4.1).
pub const FRAME_HEADER_LEN: usize = 9;

/// The nine-octet header that precedes every HTTP/2 frame payload.
///
/// `stream_id`'s top (reserved) bit is always clear here: [`FrameHeader::parse`]
/// masks it off on the way in, and [`FrameHeader::emit`] never sets it on the
/// way out, so round-tripping a header always preserves this invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: u8,
    pub flags: u8,
    pub stream_id: u32,
}

/// Registered HTTP/2 frame type identifiers (RFC 7540 §11.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    GoAway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
}

impl FrameType {
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x0 => Self::Data,
            0x1 => Self::Headers,
            0x2 => Self::Priority,
            0x3 => Self::RstStream,
            0x4 => Self::Settings,
            0x5 => Self::PushPromise,
            0x6 => Self::Ping,
            0x7 => Self::GoAway,
            0x8 => Self::WindowUpdate,
            0x9 => Self::Continuation,
            _ => return None,
        })
    }
}

/// Reserved stream-id bit (RFC 7540 §4.1): "R: A reserved 1-bit field."
const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

impl FrameHeader {
    /// Parses the 9-octet frame header at the front of `input`.
    ///
    /// `input` must be at least [`FRAME_HEADER_LEN`] bytes; callers are
    /// expected to have already buffered that much before calling this (the
    /// caller owns framing off the transport).
    #[inline]
    pub fn parse(input: &[u8]) -> FrameHeader {
        debug_assert!(input.len() >= FRAME_HEADER_LEN);
        let length = u32::from(input[0]) << 16 | u32::from(input[1]) << 8 | u32::from(input[2]);
        let kind = input[3];
        let flags = input[4];
        let stream_id = (u32::from(input[5]) << 24
            | u32::from(input[6]) << 16
            | u32::from(input[7]) << 8
            | u32::from(input[8]))
            & STREAM_ID_MASK;
        FrameHeader {
            length,
            kind,
            flags,
            stream_id,
        }
    }

    /// Serializes this header into the first [`FRAME_HEADER_LEN`] bytes of
    /// `out`. Panics if `out` is too short -- callers always pre-size their
    /// output buffer, so this is a programmer error rather than a runtime one.
    #[inline]
    pub fn emit(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= FRAME_HEADER_LEN);
        out[0] = (self.length >> 16) as u8;
        out[1] = (self.length >> 8) as u8;
        out[2] = self.length as u8;
        out[3] = self.kind;
        out[4] = self.flags;
        let id = self.stream_id & STREAM_ID_MASK;
        out[5] = (id >> 24) as u8;
        out[6] = (id >> 16) as u8;
        out[7] = (id >> 8) as u8;
        out[8] = id as u8;
    }
}
