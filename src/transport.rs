//! The narrow transport collaborator contract (spec §6). The core never
//! touches a socket directly: HTTP/2 connections and HTTP/1.1 pooled
//! connections are generic over anything implementing this trait, so the
//! protocol engine compiles and tests independent of TLS/TCP.

use std::io;
use std::time::Instant;

/// An octet-oriented bidirectional stream with deadline-aware I/O.
///
/// Implementations are expected to be cheaply `Send`-able between the
/// connection's reader and writer sides (a raw socket fd, a boxed TLS
/// stream, or -- in tests -- an in-memory pipe).
pub trait Transport: Send {
    /// Reads into `buf`, returning the number of bytes read (0 on EOF).
    /// Blocks until at least one byte is available, EOF, or `deadline`
    /// elapses, in which case it returns `io::ErrorKind::TimedOut`.
    fn read_with_deadline(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> io::Result<usize>;

    /// Writes all of `buf`, returning once every byte has been accepted by
    /// the transport or `deadline` elapses.
    fn write_with_deadline(&mut self, buf: &[u8], deadline: Option<Instant>) -> io::Result<()>;

    /// Sets (or clears, with `None`) a deadline applying to the next
    /// operation that doesn't specify its own.
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// Closes the underlying connection. Idempotent.
    fn close(&mut self) -> io::Result<()>;
}
