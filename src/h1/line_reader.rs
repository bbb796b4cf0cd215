//! Zero-copy line reader (spec §4.11 "Response parse"): buffers octets off
//! the transport and hands back CRLF-delimited lines as slices borrowed
//! from its own buffer, so the status line, each header line, and each
//! chunk-size line are never individually allocated. Grounded on the
//! buffer-growth loop in `rama-http-core`'s `proto::h1::role::parse_headers`
//! (`is_complete_fast`), adapted to blocking reads over one line at a time
//! instead of a single whole-message scan.

use std::io;
use std::time::Instant;

use crate::transport::Transport;

const INITIAL_CAPACITY: usize = 4 * 1024;
const GROWTH_STEP: usize = 4 * 1024;
/// Once fewer than this many unconsumed bytes remain at the front, the
/// buffer is compacted back to offset 0 rather than left to grow unbounded
/// across a long-lived connection.
const COMPACT_THRESHOLD: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineReaderError {
    LineTooLong { max: usize },
    UnexpectedEof,
}

impl std::fmt::Display for LineReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineReaderError::LineTooLong { max } => write!(f, "line exceeded {max} byte cap"),
            LineReaderError::UnexpectedEof => write!(f, "connection closed mid-message"),
        }
    }
}

impl std::error::Error for LineReaderError {}

/// Buffers reads from a [`Transport`] and serves CRLF-delimited lines and
/// raw byte runs without per-call allocation.
pub struct LineReader<'t, T: Transport> {
    transport: &'t mut T,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    max_line: usize,
}

impl<'t, T: Transport> LineReader<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self::with_leftover(transport, Vec::new())
    }

    /// Builds a reader primed with bytes already pulled off the transport by
    /// a previous reader on the same connection (e.g. a pipelined response
    /// read ahead into the prior call's buffer; see [`Self::into_leftover`]).
    pub fn with_leftover(transport: &'t mut T, leftover: Vec<u8>) -> Self {
        let filled = leftover.len();
        let mut buf = leftover;
        if buf.len() < INITIAL_CAPACITY {
            buf.resize(INITIAL_CAPACITY, 0);
        }
        LineReader {
            transport,
            buf,
            pos: 0,
            filled,
            max_line: 16 * 1024,
        }
    }

    pub fn with_max_line(mut self, max: usize) -> Self {
        self.max_line = max;
        self
    }

    /// Drains the unread tail of the internal buffer, so it can be handed to
    /// the next [`LineReader`] built over the same connection instead of
    /// being dropped with bytes the transport will never redeliver.
    pub fn into_leftover(self) -> Vec<u8> {
        self.buf[self.pos..self.filled].to_vec()
    }

    fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        if self.filled - self.pos < COMPACT_THRESHOLD || self.pos == self.filled {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
    }

    fn fill_more(&mut self, deadline: Option<Instant>) -> io::Result<usize> {
        self.compact();
        if self.filled == self.buf.len() {
            if self.buf.len() >= self.max_line + GROWTH_STEP {
                return Err(io::Error::new(io::ErrorKind::InvalidData, LineReaderError::LineTooLong { max: self.max_line }));
            }
            self.buf.resize(self.buf.len() + GROWTH_STEP, 0);
        }
        let n = self.transport.read_with_deadline(&mut self.buf[self.filled..], deadline)?;
        self.filled += n;
        Ok(n)
    }

    /// Returns the next line, CRLF stripped, or `Ok(None)` on a clean EOF
    /// before any more data arrived. The returned slice is only valid until
    /// the next call into this reader.
    pub fn read_line(&mut self, deadline: Option<Instant>) -> io::Result<Option<&[u8]>> {
        loop {
            if let Some(nl) = memchr(b'\n', &self.buf[self.pos..self.filled]) {
                let line_end = self.pos + nl;
                let end = if line_end > self.pos && self.buf[line_end - 1] == b'\r' {
                    line_end - 1
                } else {
                    line_end
                };
                let start = self.pos;
                self.pos = self.pos + nl + 1;
                return Ok(Some(&self.buf[start..end]));
            }
            if self.filled - self.pos > self.max_line {
                return Err(io::Error::new(io::ErrorKind::InvalidData, LineReaderError::LineTooLong { max: self.max_line }));
            }
            let n = self.fill_more(deadline)?;
            if n == 0 {
                return if self.pos == self.filled {
                    Ok(None)
                } else {
                    Err(io::Error::new(io::ErrorKind::UnexpectedEof, LineReaderError::UnexpectedEof))
                };
            }
        }
    }

    /// Fills `dst` completely, first draining already-buffered bytes, then
    /// reading the remainder directly from the transport (no extra copy
    /// through the internal buffer for large reads).
    pub fn read_exact(&mut self, dst: &mut [u8], deadline: Option<Instant>) -> io::Result<()> {
        let mut written = 0;
        while written < dst.len() {
            if self.pos < self.filled {
                let avail = self.filled - self.pos;
                let take = avail.min(dst.len() - written);
                dst[written..written + take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
                self.pos += take;
                written += take;
            } else {
                let n = self.transport.read_with_deadline(&mut dst[written..], deadline)?;
                if n == 0 {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, LineReaderError::UnexpectedEof));
                }
                written += n;
            }
        }
        Ok(())
    }

    /// Copies up to `dst.len()` bytes, preferring already-buffered data,
    /// falling back to one transport read. `0` means EOF.
    pub fn read_some(&mut self, dst: &mut [u8], deadline: Option<Instant>) -> io::Result<usize> {
        if self.pos < self.filled {
            let avail = self.filled - self.pos;
            let take = avail.min(dst.len());
            dst[..take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            return Ok(take);
        }
        self.transport.read_with_deadline(dst, deadline)
    }

    /// Discards exactly `n` bytes (used to skip a chunk's trailing CRLF).
    pub fn skip(&mut self, mut n: usize, deadline: Option<Instant>) -> io::Result<()> {
        let mut scratch = [0u8; 64];
        while n > 0 {
            let take = n.min(scratch.len());
            self.read_exact(&mut scratch[..take], deadline)?;
            n -= take;
        }
        Ok(())
    }
}

#[inline]
fn memchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeTransport {
        chunks: VecDeque<Vec<u8>>,
    }

    impl FakeTransport {
        fn new(data: &[u8], chunk_size: usize) -> Self {
            let chunks = data.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect();
            FakeTransport { chunks }
        }
    }

    impl Transport for FakeTransport {
        fn read_with_deadline(&mut self, buf: &mut [u8], _deadline: Option<Instant>) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }
        fn write_with_deadline(&mut self, _buf: &[u8], _deadline: Option<Instant>) -> io::Result<()> {
            Ok(())
        }
        fn set_deadline(&mut self, _deadline: Option<Instant>) {}
        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reads_lines_split_across_reads() {
        let mut t = FakeTransport::new(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello", 7);
        let mut r = LineReader::new(&mut t);
        assert_eq!(r.read_line(None).unwrap(), Some(&b"HTTP/1.1 200 OK"[..]));
        assert_eq!(r.read_line(None).unwrap(), Some(&b"Content-Length: 5"[..]));
        assert_eq!(r.read_line(None).unwrap(), Some(&b""[..]));
        let mut body = [0u8; 5];
        r.read_exact(&mut body, None).unwrap();
        assert_eq!(&body, b"hello");
    }

    #[test]
    fn eof_mid_line_is_an_error() {
        let mut t = FakeTransport::new(b"abcdef", 64);
        let mut r = LineReader::new(&mut t);
        assert!(r.read_line(None).is_err(), "EOF before a CRLF must not be treated as a clean close");
    }

    #[test]
    fn read_some_drains_buffered_bytes_before_transport() {
        let mut t = FakeTransport::new(b"AB\r\nCD", 64);
        let mut r = LineReader::new(&mut t);
        assert_eq!(r.read_line(None).unwrap(), Some(&b"AB"[..]));
        // "CD" remains buffered with the transport now exhausted; read_some
        // must serve it from the buffer rather than calling the transport.
        let mut dst = [0u8; 2];
        assert_eq!(r.read_some(&mut dst, None).unwrap(), 2);
        assert_eq!(&dst, b"CD");
    }

    #[test]
    fn clean_eof_before_any_line() {
        let mut t = FakeTransport::new(b"", 1);
        let mut r = LineReader::new(&mut t);
        assert_eq!(r.read_line(None).unwrap(), None);
    }

    #[test]
    fn leftover_survives_into_the_next_reader_on_the_same_transport() {
        // Two responses arrive coalesced into one read; the first reader
        // only consumes the first and must hand the rest on.
        let mut t = FakeTransport::new(b"first\r\nsecond\r\n", 64);
        let mut r = LineReader::new(&mut t);
        assert_eq!(r.read_line(None).unwrap(), Some(&b"first"[..]));
        let leftover = r.into_leftover();
        assert_eq!(&leftover, b"second\r\n");

        // The transport is now exhausted, so the only way to see "second"
        // is via the carried-over leftover bytes.
        let mut r2 = LineReader::with_leftover(&mut t, leftover);
        assert_eq!(r2.read_line(None).unwrap(), Some(&b"second"[..]));
    }
}
