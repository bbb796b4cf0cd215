//! Connection- and stream-scoped error taxonomy (spec §7).

use std::fmt;

/// RFC 7540 §7 error codes, carried on RST_STREAM and GOAWAY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reason(u32);

impl Reason {
    pub const NO_ERROR: Reason = Reason(0x0);
    pub const PROTOCOL_ERROR: Reason = Reason(0x1);
    pub const INTERNAL_ERROR: Reason = Reason(0x2);
    pub const FLOW_CONTROL_ERROR: Reason = Reason(0x3);
    pub const SETTINGS_TIMEOUT: Reason = Reason(0x4);
    pub const STREAM_CLOSED: Reason = Reason(0x5);
    pub const FRAME_SIZE_ERROR: Reason = Reason(0x6);
    pub const REFUSED_STREAM: Reason = Reason(0x7);
    pub const CANCEL: Reason = Reason(0x8);
    pub const COMPRESSION_ERROR: Reason = Reason(0x9);
    pub const CONNECT_ERROR: Reason = Reason(0xa);
    pub const ENHANCE_YOUR_CALM: Reason = Reason(0xb);
    pub const INADEQUATE_SECURITY: Reason = Reason(0xc);
    pub const HTTP_1_1_REQUIRED: Reason = Reason(0xd);

    pub const fn new(code: u32) -> Self {
        Reason(code)
    }

    pub const fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Reason::NO_ERROR => "NO_ERROR",
            Reason::PROTOCOL_ERROR => "PROTOCOL_ERROR",
            Reason::INTERNAL_ERROR => "INTERNAL_ERROR",
            Reason::FLOW_CONTROL_ERROR => "FLOW_CONTROL_ERROR",
            Reason::SETTINGS_TIMEOUT => "SETTINGS_TIMEOUT",
            Reason::STREAM_CLOSED => "STREAM_CLOSED",
            Reason::FRAME_SIZE_ERROR => "FRAME_SIZE_ERROR",
            Reason::REFUSED_STREAM => "REFUSED_STREAM",
            Reason::CANCEL => "CANCEL",
            Reason::COMPRESSION_ERROR => "COMPRESSION_ERROR",
            Reason::CONNECT_ERROR => "CONNECT_ERROR",
            Reason::ENHANCE_YOUR_CALM => "ENHANCE_YOUR_CALM",
            Reason::INADEQUATE_SECURITY => "INADEQUATE_SECURITY",
            Reason::HTTP_1_1_REQUIRED => "HTTP_1_1_REQUIRED",
            other => return write!(f, "unknown error code 0x{:x}", other.0),
        };
        f.write_str(name)
    }
}

/// Who caused a stream or connection error: the remote peer, this library
/// noticing a protocol violation, or the crate's own caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Remote,
    Library,
    User,
}

/// A connection- or stream-scoped protocol error. Connection-scoped variants
/// carry the reason that must go out on GOAWAY; stream-scoped variants carry
/// the reason for RST_STREAM.
#[derive(Debug, Clone)]
pub enum Error {
    /// The connection must be torn down with GOAWAY(reason), having last
    /// fully processed `last_stream_id`.
    GoAway {
        last_stream_id: u32,
        reason: Reason,
        initiator: Initiator,
    },
    /// A single stream must be reset with RST_STREAM(reason); the
    /// connection survives.
    Reset {
        stream_id: u32,
        reason: Reason,
        initiator: Initiator,
    },
    /// A transport-level I/O error; always connection-terminal.
    Io(String),
}

impl Error {
    pub fn go_away(last_stream_id: u32, reason: Reason, initiator: Initiator) -> Self {
        Error::GoAway {
            last_stream_id,
            reason,
            initiator,
        }
    }

    pub fn reset(stream_id: u32, reason: Reason, initiator: Initiator) -> Self {
        Error::Reset {
            stream_id,
            reason,
            initiator,
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match *self {
            Error::GoAway { reason, .. } | Error::Reset { reason, .. } => Some(reason),
            Error::Io(_) => None,
        }
    }

    pub fn is_connection_level(&self) -> bool {
        matches!(self, Error::GoAway { .. } | Error::Io(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GoAway {
                reason, initiator, ..
            } => write!(f, "connection error ({initiator:?}): {reason}"),
            Error::Reset {
                stream_id,
                reason,
                initiator,
            } => write!(f, "stream {stream_id} error ({initiator:?}): {reason}"),
            Error::Io(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_display_matches_rfc_names() {
        assert_eq!(Reason::FLOW_CONTROL_ERROR.to_string(), "FLOW_CONTROL_ERROR");
        assert_eq!(Reason::new(0x99).to_string(), "unknown error code 0x99");
    }

    #[test]
    fn go_away_error_carries_reason() {
        let err = Error::go_away(7, Reason::PROTOCOL_ERROR, Initiator::Library);
        assert_eq!(err.reason(), Some(Reason::PROTOCOL_ERROR));
        assert!(err.is_connection_level());
    }
}
