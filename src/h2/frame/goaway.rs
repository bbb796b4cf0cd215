use crate::h2::error::Reason;
use crate::wire::FrameHeader;

use super::{frame_size_error, protocol_error, FrameError};

/// GOAWAY frame (RFC 7540 §6.8). `debug_data` is opaque diagnostic data, not
/// interpreted by this crate.
#[derive(Debug, PartialEq, Eq)]
pub struct GoAway<'a> {
    pub last_stream_id: u32,
    pub reason: Reason,
    pub debug_data: &'a [u8],
}

impl<'a> GoAway<'a> {
    pub fn new(last_stream_id: u32, reason: Reason, debug_data: &'a [u8]) -> Self {
        GoAway {
            last_stream_id,
            reason,
            debug_data,
        }
    }

    pub fn parse(header: FrameHeader, payload: &'a [u8]) -> Result<GoAway<'a>, FrameError> {
        if header.stream_id != 0 {
            return Err(protocol_error());
        }
        if payload.len() < 8 {
            return Err(frame_size_error());
        }
        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let code = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        Ok(GoAway {
            last_stream_id: raw & 0x7FFF_FFFF,
            reason: Reason::new(code),
            debug_data: &payload[8..],
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.last_stream_id & 0x7FFF_FFFF).to_be_bytes());
        out.extend_from_slice(&self.reason.code().to_be_bytes());
        out.extend_from_slice(self.debug_data);
    }
}
