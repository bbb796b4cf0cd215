//! Typed frame parsers and serializers (spec §4.4), one file per HTTP/2
//! frame type, dispatched on the 9-octet frame header.

mod continuation;
mod data;
mod goaway;
mod headers;
mod ping;
mod priority;
mod push_promise;
mod rst_stream;
mod settings;
mod window_update;

pub use continuation::Continuation;
pub use data::Data;
pub use goaway::GoAway;
pub use headers::{Headers, StreamDependency};
pub use ping::Ping;
pub use priority::Priority;
pub use push_promise::PushPromise;
pub use rst_stream::RstStream;
pub use settings::{Setting, SettingId, Settings};
pub use window_update::WindowUpdate;

use crate::h2::error::Reason;
use crate::wire::{FrameHeader, FrameType, FRAME_HEADER_LEN};

/// Default/minimum/maximum for `SETTINGS_MAX_FRAME_SIZE` (RFC 7540 §6.5.2).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const MIN_MAX_FRAME_SIZE: u32 = 16_384;
pub const MAX_MAX_FRAME_SIZE: u32 = (1 << 24) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A per-type framing constraint was violated (e.g. PRIORITY with the
    /// wrong length, a zero stream id on HEADERS). Carries the GOAWAY
    /// reason the connection must use.
    Invalid(Reason),
}

impl FrameError {
    pub fn reason(self) -> Reason {
        match self {
            FrameError::Invalid(r) => r,
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid frame: {}", self.reason())
    }
}

impl std::error::Error for FrameError {}

fn protocol_error() -> FrameError {
    FrameError::Invalid(Reason::PROTOCOL_ERROR)
}

fn frame_size_error() -> FrameError {
    FrameError::Invalid(Reason::FRAME_SIZE_ERROR)
}

/// A parsed HTTP/2 frame. Payload fields borrow from the caller's receive
/// buffer for the lifetime of one parse step (`'a`); the caller (the
/// connection's frame-dispatch loop) is responsible for copying whatever it
/// needs to retain into stream state before the buffer is reused.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Data(Data<'a>),
    Headers(Headers<'a>),
    Priority(Priority),
    RstStream(RstStream),
    Settings(Settings),
    PushPromise(PushPromise<'a>),
    Ping(Ping),
    GoAway(GoAway<'a>),
    WindowUpdate(WindowUpdate),
    Continuation(Continuation<'a>),
    /// An unrecognized frame type: forwarded upstream as opaque rather than
    /// rejected (spec §4.4 "Unknown frame types must be ignored at the
    /// validation layer").
    Unknown { kind: u8, stream_id: u32 },
}

impl<'a> Frame<'a> {
    /// Parses one frame: `header` is the already-decoded 9-octet frame
    /// header, `payload` is exactly `header.length` bytes that follow it.
    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<Frame<'a>, FrameError> {
        debug_assert_eq!(payload.len(), header.length as usize);

        let Some(kind) = FrameType::from_u8(header.kind) else {
            return Ok(Frame::Unknown {
                kind: header.kind,
                stream_id: header.stream_id,
            });
        };

        match kind {
            FrameType::Data => Data::parse(header, payload).map(Frame::Data),
            FrameType::Headers => Headers::parse(header, payload).map(Frame::Headers),
            FrameType::Priority => Priority::parse(header, payload).map(Frame::Priority),
            FrameType::RstStream => RstStream::parse(header, payload).map(Frame::RstStream),
            FrameType::Settings => Settings::parse(header, payload).map(Frame::Settings),
            FrameType::PushPromise => {
                PushPromise::parse(header, payload).map(Frame::PushPromise)
            }
            FrameType::Ping => Ping::parse(header, payload).map(Frame::Ping),
            FrameType::GoAway => GoAway::parse(header, payload).map(Frame::GoAway),
            FrameType::WindowUpdate => {
                WindowUpdate::parse(header, payload).map(Frame::WindowUpdate)
            }
            FrameType::Continuation => {
                Continuation::parse(header, payload).map(Frame::Continuation)
            }
        }
    }

    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data(f) => f.stream_id,
            Frame::Headers(f) => f.stream_id,
            Frame::Priority(f) => f.stream_id,
            Frame::RstStream(f) => f.stream_id,
            Frame::Settings(_) => 0,
            Frame::PushPromise(f) => f.stream_id,
            Frame::Ping(_) => 0,
            Frame::GoAway(_) => 0,
            Frame::WindowUpdate(f) => f.stream_id,
            Frame::Continuation(f) => f.stream_id,
            Frame::Unknown { stream_id, .. } => *stream_id,
        }
    }
}

/// Parses the optional PADDED/PRIORITY prefix shared by HEADERS and
/// PUSH_PROMISE (spec §4.4 "HEADERS layout"). Returns the pad length, the
/// optional stream dependency, and the remainder of the payload (header
/// block fragment + padding).
fn parse_headers_prefix<'a>(
    payload: &'a [u8],
    padded: bool,
    priority: bool,
) -> Result<(u8, Option<StreamDependency>, &'a [u8]), FrameError> {
    let mut rest = payload;
    let mut pad_len = 0u8;

    if padded {
        if rest.is_empty() {
            return Err(frame_size_error());
        }
        pad_len = rest[0];
        rest = &rest[1..];
    }

    let dependency = if priority {
        if rest.len() < 5 {
            return Err(frame_size_error());
        }
        let raw = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let exclusive = raw & 0x8000_0000 != 0;
        let parent = raw & 0x7FFF_FFFF;
        let weight = rest[4];
        rest = &rest[5..];
        Some(StreamDependency {
            parent_stream_id: parent,
            weight,
            exclusive,
        })
    } else {
        None
    };

    // spec §3 "padding ≤ payload − 1 when PADDED" / RFC 7540 §6.2: an
    // oversized pad length is PROTOCOL_ERROR, matching the DATA frame's
    // equivalent check (data.rs), not a frame-size violation.
    if pad_len as usize > rest.len() {
        return Err(protocol_error());
    }
    let fragment = &rest[..rest.len() - pad_len as usize];
    Ok((pad_len, dependency, fragment))
}
