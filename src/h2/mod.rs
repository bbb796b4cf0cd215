//! HTTP/2 protocol engine: frame codec, stream state machine, dual-level
//! flow control, priority tree and the sharded connection manager.
//!
//! This module is transport-agnostic -- see [`crate::transport::Transport`]
//! -- and blocking rather than `Future`/`Poll`-based: stream reads block on
//! a condition variable, matching the scheduling model in spec §5.

pub mod connection;
pub mod error;
pub mod flow_control;
pub mod frame;
pub mod priority;
pub mod settings;
pub mod stream;

pub use connection::Connection;
pub use error::{Error, Reason};
pub use stream::{Stream, StreamState};

/// The 24-octet client connection preface (RFC 7540 §3.5), sent before the
/// first SETTINGS frame.
pub const CONNECTION_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
