//! `corehttp`: an HTTP/1.1 client with a protocol-aware connection pool, and
//! an HTTP/2 protocol engine (frame codec, HPACK, stream state machine, dual
//! level flow control, priority tree, sharded connection manager).
//!
//! This crate implements the *core* protocol layer only. Transport I/O
//! (TCP/TLS sockets), the HTTP/3 server surface, CLI wrappers and
//! user-facing request/response ergonomics are out of scope — see
//! [`transport::Transport`] for the narrow interface this crate expects
//! from its caller.

#![allow(unreachable_pub)]

pub mod config;
pub mod error;
pub mod h1;
pub mod h2;
pub mod hpack;
pub mod pool;
pub mod stats;
pub mod transport;
pub mod wire;

pub use error::CoreError;
