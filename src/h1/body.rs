//! Body reader selection (spec §4.11 "Body reader selection"): once the
//! response head is parsed, the right body strategy is picked from the
//! status code, the request method, and the `Content-Length`/
//! `Transfer-Encoding` headers.

use std::io;
use std::time::Instant;

use crate::transport::Transport;

use super::line_reader::{LineReader, LineReaderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    MalformedChunkSize,
    ChunkTooLarge,
    TrailerTooLong,
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::MalformedChunkSize => write!(f, "malformed chunk size line"),
            BodyError::ChunkTooLarge => write!(f, "chunk size exceeds the configured cap"),
            BodyError::TrailerTooLong => write!(f, "chunked trailer section exceeds the configured cap"),
        }
    }
}

impl std::error::Error for BodyError {}

/// The four body strategies spec §4.11 enumerates.
enum BodyState {
    /// HEAD responses and 204/304 never carry a body.
    Empty,
    /// `Transfer-Encoding: chunked`.
    Chunked { remaining_in_chunk: u64, finished: bool },
    /// `Content-Length: N`.
    LengthLimited { remaining: u64 },
    /// Neither header present: read until the peer closes the connection.
    /// Such a connection is never reusable (spec §4.11).
    ReadUntilEof { eof: bool },
}

/// Reads a response body over a [`LineReader`] already positioned just past
/// the header block's trailing blank line.
pub struct Body<'a, 't, T: Transport> {
    reader: &'a mut LineReader<'t, T>,
    state: BodyState,
    max_chunk_size: u64,
}

impl<'a, 't, T: Transport> Body<'a, 't, T> {
    pub fn empty(reader: &'a mut LineReader<'t, T>) -> Self {
        Body { reader, state: BodyState::Empty, max_chunk_size: u64::MAX }
    }

    pub fn chunked(reader: &'a mut LineReader<'t, T>) -> Self {
        Body {
            reader,
            state: BodyState::Chunked { remaining_in_chunk: 0, finished: false },
            max_chunk_size: 64 * 1024 * 1024,
        }
    }

    pub fn length_limited(reader: &'a mut LineReader<'t, T>, len: u64) -> Self {
        Body { reader, state: BodyState::LengthLimited { remaining: len }, max_chunk_size: u64::MAX }
    }

    pub fn read_until_eof(reader: &'a mut LineReader<'t, T>) -> Self {
        Body { reader, state: BodyState::ReadUntilEof { eof: false }, max_chunk_size: u64::MAX }
    }

    /// Whether the underlying connection may be reused once this body is
    /// fully drained (spec §4.11 "Connection lifecycle per request").
    pub fn connection_reusable(&self) -> bool {
        !matches!(self.state, BodyState::ReadUntilEof { .. })
    }

    /// Reads up to `dst.len()` bytes of body data; `0` means the body (not
    /// necessarily the connection) has ended.
    pub fn read(&mut self, dst: &mut [u8], deadline: Option<Instant>) -> io::Result<usize> {
        match &mut self.state {
            BodyState::Empty => Ok(0),
            BodyState::ReadUntilEof { eof } => {
                if *eof {
                    return Ok(0);
                }
                let n = self.reader.read_some(dst, deadline)?;
                if n == 0 {
                    *eof = true;
                }
                Ok(n)
            }
            BodyState::LengthLimited { remaining } => {
                if *remaining == 0 {
                    return Ok(0);
                }
                let want = (*remaining as usize).min(dst.len());
                self.reader.read_exact(&mut dst[..want], deadline)?;
                *remaining -= want as u64;
                Ok(want)
            }
            BodyState::Chunked { .. } => self.read_chunked(dst, deadline),
        }
    }

    fn read_chunked(&mut self, dst: &mut [u8], deadline: Option<Instant>) -> io::Result<usize> {
        loop {
            let (remaining_in_chunk, finished) = match &mut self.state {
                BodyState::Chunked { remaining_in_chunk, finished } => (remaining_in_chunk, finished),
                _ => unreachable!(),
            };
            if *finished {
                return Ok(0);
            }
            if *remaining_in_chunk == 0 {
                let size = read_chunk_size(self.reader, deadline, self.max_chunk_size)?;
                if size == 0 {
                    drain_trailers(self.reader, deadline)?;
                    if let BodyState::Chunked { finished, .. } = &mut self.state {
                        *finished = true;
                    }
                    return Ok(0);
                }
                if let BodyState::Chunked { remaining_in_chunk, .. } = &mut self.state {
                    *remaining_in_chunk = size;
                }
                continue;
            }
            let want = (*remaining_in_chunk as usize).min(dst.len());
            self.reader.read_exact(&mut dst[..want], deadline)?;
            if let BodyState::Chunked { remaining_in_chunk, .. } = &mut self.state {
                *remaining_in_chunk -= want as u64;
                if *remaining_in_chunk == 0 {
                    // Each chunk-data segment is followed by a bare CRLF.
                    self.reader.skip(2, deadline)?;
                }
            }
            return Ok(want);
        }
    }

    /// Reads the whole body into `out`, growing it as needed. Used by the
    /// health-check prober and anywhere the caller wants a complete buffer
    /// rather than a streaming read.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>, deadline: Option<Instant>) -> io::Result<()> {
        let mut chunk = [0u8; 8 * 1024];
        loop {
            let n = self.read(&mut chunk, deadline)?;
            if n == 0 {
                return Ok(());
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }
}

fn read_chunk_size<T: Transport>(reader: &mut LineReader<'_, T>, deadline: Option<Instant>, max: u64) -> io::Result<u64> {
    let line = reader
        .read_line(deadline)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, LineReaderError::UnexpectedEof))?;
    // Chunk extensions (`;name=value`) are accepted but ignored.
    let size_str = match line.iter().position(|&b| b == b';') {
        Some(i) => &line[..i],
        None => line,
    };
    let size = parse_hex_u64(size_str).ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, BodyError::MalformedChunkSize))?;
    if size > max {
        return Err(io::Error::new(io::ErrorKind::InvalidData, BodyError::ChunkTooLarge));
    }
    Ok(size)
}

fn drain_trailers<T: Transport>(reader: &mut LineReader<'_, T>, deadline: Option<Instant>) -> io::Result<()> {
    const MAX_TRAILER_LINES: usize = 100;
    for _ in 0..MAX_TRAILER_LINES {
        match reader.read_line(deadline)? {
            Some(line) if line.is_empty() => return Ok(()),
            Some(_) => continue,
            None => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, LineReaderError::UnexpectedEof)),
        }
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, BodyError::TrailerTooLong))
}

fn parse_hex_u64(s: &[u8]) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in s {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return None,
        };
        value = value.checked_mul(16)?.checked_add(digit as u64)?;
    }
    Some(value)
}

/// Decides which [`BodyState`]-backed reader to build for a response, per
/// spec §4.11's bullet list. `status` uses the fast path already shared
/// with the status-line parser.
pub fn select_body_kind(method_is_head: bool, status: u16, has_chunked_encoding: bool, content_length: Option<u64>) -> BodyKind {
    if method_is_head || status == 204 || status == 304 {
        return BodyKind::Empty;
    }
    if has_chunked_encoding {
        return BodyKind::Chunked;
    }
    if let Some(len) = content_length {
        return BodyKind::LengthLimited(len);
    }
    BodyKind::ReadUntilEof
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    Chunked,
    LengthLimited(u64),
    ReadUntilEof,
}
