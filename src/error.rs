//! Crate-root error type (spec §7): a single enum composing each
//! subsystem's own error type, mirroring how the teacher layers
//! `h2::Error` over `proto::Error` over `codec::{SendError, UserError}`.

use std::fmt;

use crate::h2::flow_control::FlowControlError;
use crate::h2::priority::PriorityError;
use crate::h2::stream::StreamError;
use crate::h2::{frame::FrameError, Error as H2Error};
use crate::hpack::HpackDecodeError;

/// Top-level error returned by any public `corehttp` operation.
#[derive(Debug)]
pub enum CoreError {
    Hpack(HpackDecodeError),
    Frame(FrameError),
    FlowControl(FlowControlError),
    Stream(StreamError),
    Priority(PriorityError),
    H2(H2Error),
    Pool(crate::pool::PoolError),
    Client(crate::h1::ClientError),
    Io(std::io::Error),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Hpack(e) => write!(f, "hpack error: {e}"),
            CoreError::Frame(e) => write!(f, "frame error: {e}"),
            CoreError::FlowControl(e) => write!(f, "flow control error: {e}"),
            CoreError::Stream(e) => write!(f, "stream error: {e}"),
            CoreError::Priority(e) => write!(f, "priority error: {e}"),
            CoreError::H2(e) => write!(f, "{e}"),
            CoreError::Pool(e) => write!(f, "pool error: {e}"),
            CoreError::Client(e) => write!(f, "client error: {e}"),
            CoreError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<HpackDecodeError> for CoreError {
    fn from(e: HpackDecodeError) -> Self {
        CoreError::Hpack(e)
    }
}

impl From<FrameError> for CoreError {
    fn from(e: FrameError) -> Self {
        CoreError::Frame(e)
    }
}

impl From<FlowControlError> for CoreError {
    fn from(e: FlowControlError) -> Self {
        CoreError::FlowControl(e)
    }
}

impl From<StreamError> for CoreError {
    fn from(e: StreamError) -> Self {
        CoreError::Stream(e)
    }
}

impl From<PriorityError> for CoreError {
    fn from(e: PriorityError) -> Self {
        CoreError::Priority(e)
    }
}

impl From<H2Error> for CoreError {
    fn from(e: H2Error) -> Self {
        CoreError::H2(e)
    }
}

impl From<crate::pool::PoolError> for CoreError {
    fn from(e: crate::pool::PoolError) -> Self {
        CoreError::Pool(e)
    }
}

impl From<crate::h1::ClientError> for CoreError {
    fn from(e: crate::h1::ClientError) -> Self {
        CoreError::Client(e)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_hpack_error_with_display() {
        let err: CoreError = HpackDecodeError::MalformedInteger.into();
        assert_eq!(err.to_string(), "hpack error: malformed HPACK integer");
    }
}
