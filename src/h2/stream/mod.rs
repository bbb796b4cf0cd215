//! Stream state machine and buffered I/O (spec §4.6).
//!
//! Blocking I/O rather than `Future`/`Poll`: `read` suspends the calling
//! thread on a condition variable bound to the receive buffer's mutex,
//! matching spec §5's scheduling model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::h2::error::Reason;
use crate::h2::flow_control::Window;
use crate::hpack::HeaderField;

pub const DEFAULT_STREAM_BUFFER_CAP: usize = 1024 * 1024;

/// RFC 7540 §5.1's seven states. `Inner`/`Peer` split mirrors how the two
/// half-closed directions are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// What drove a state transition -- kept distinct from the state itself so
/// the reset code/initiator survive into `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    HeadersNoEndStream,
    /// Locally-sent HEADERS carrying END_STREAM (a bodyless request/response):
    /// closes this side's send direction, per RFC 7540 §5.1 Idle ->
    /// HalfClosedLocal. Not to be confused with [`Cause::HeadersEndStreamReceived`].
    HeadersEndStreamSent,
    /// Peer-received HEADERS carrying END_STREAM: closes the peer's send
    /// direction as observed from here, per RFC 7540 §5.1 Idle ->
    /// HalfClosedRemote.
    HeadersEndStreamReceived,
    PushPromise,
    EndStreamSent,
    EndStreamReceived,
    Reset(Reason),
    ConnectionError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The transition table in spec §4.6 has no entry for this (from, cause)
    /// pair.
    InvalidTransition,
    SelfDependency,
    SendSideClosed,
    BufferCapExceeded,
    Cancelled,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::InvalidTransition => write!(f, "invalid stream state transition"),
            StreamError::SelfDependency => write!(f, "stream cannot depend on itself"),
            StreamError::SendSideClosed => write!(f, "stream send side is closed"),
            StreamError::BufferCapExceeded => write!(f, "stream buffer cap exceeded"),
            StreamError::Cancelled => write!(f, "stream cancelled"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamState {
    /// Applies `cause`, returning the new state or rejecting transitions the
    /// spec §4.6 table does not list.
    pub fn apply(self, cause: Cause) -> Result<StreamState, StreamError> {
        use Cause::*;
        use StreamState::*;
        let next = match (self, cause) {
            (Idle, HeadersNoEndStream) => Open,
            (Idle, HeadersEndStreamSent) => HalfClosedLocal,
            (Idle, HeadersEndStreamReceived) => HalfClosedRemote,
            (Idle, PushPromise) => ReservedLocal,
            (Idle, Reset(_)) | (Idle, ConnectionError) => Closed,
            (ReservedLocal, EndStreamSent) => HalfClosedRemote,
            (ReservedRemote, EndStreamReceived) => HalfClosedLocal,
            (ReservedLocal, Reset(_)) | (ReservedLocal, ConnectionError) => Closed,
            (ReservedRemote, Reset(_)) | (ReservedRemote, ConnectionError) => Closed,
            (Open, EndStreamSent) => HalfClosedLocal,
            (Open, EndStreamReceived) => HalfClosedRemote,
            (Open, Reset(_)) | (Open, ConnectionError) => Closed,
            (HalfClosedLocal, EndStreamReceived) => Closed,
            (HalfClosedLocal, Reset(_)) | (HalfClosedLocal, ConnectionError) => Closed,
            (HalfClosedRemote, EndStreamSent) => Closed,
            (HalfClosedRemote, Reset(_)) | (HalfClosedRemote, ConnectionError) => Closed,
            (Closed, _) => Closed,
            _ => return Err(StreamError::InvalidTransition),
        };
        Ok(next)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, StreamState::Closed)
    }

    pub fn can_send(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    pub fn can_recv(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal)
    }
}

/// A stream's priority attributes (spec §3 "Priority node").
#[derive(Debug, Clone, Copy)]
pub struct Priority {
    pub weight: u8,
    pub parent_id: u32,
    pub exclusive: bool,
}

impl Default for Priority {
    fn default() -> Self {
        Priority {
            weight: 15,
            parent_id: 0,
            exclusive: false,
        }
    }
}

struct ReceiveBuffer {
    data: VecDeque<u8>,
    closed: bool,
}

/// Cheap broadcast-cancel flag shared between a connection and every stream
/// it owns; modeled on `context.Context` cancellation (spec §5).
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One HTTP/2 stream: state, windows, priority, buffered I/O.
pub struct Stream {
    pub id: u32,
    state: Mutex<StreamState>,
    pub send_window: Mutex<Window>,
    pub recv_window: Mutex<Window>,
    priority: Mutex<Priority>,
    recv: Mutex<ReceiveBuffer>,
    recv_condvar: Condvar,
    send_buffer: Mutex<VecDeque<u8>>,
    send_closed: AtomicBool,
    pub request_headers: Mutex<Vec<HeaderField>>,
    pub response_headers: Mutex<Vec<HeaderField>>,
    pub trailers: Mutex<Vec<HeaderField>>,
    buffer_cap: usize,
    last_activity_millis: AtomicU64,
    epoch: Instant,
    cancel: CancelToken,
    reset_reason: Mutex<Option<Reason>>,
}

impl Stream {
    pub fn new(id: u32, initial_send: i32, initial_recv: i32, cancel: CancelToken) -> Self {
        let epoch = Instant::now();
        Stream {
            id,
            state: Mutex::new(StreamState::Idle),
            send_window: Mutex::new(Window::new(initial_send)),
            recv_window: Mutex::new(Window::new(initial_recv)),
            priority: Mutex::new(Priority::default()),
            recv: Mutex::new(ReceiveBuffer {
                data: VecDeque::new(),
                closed: false,
            }),
            recv_condvar: Condvar::new(),
            send_buffer: Mutex::new(VecDeque::new()),
            send_closed: AtomicBool::new(false),
            request_headers: Mutex::new(Vec::new()),
            response_headers: Mutex::new(Vec::new()),
            trailers: Mutex::new(Vec::new()),
            buffer_cap: DEFAULT_STREAM_BUFFER_CAP,
            last_activity_millis: AtomicU64::new(0),
            epoch,
            cancel,
            reset_reason: Mutex::new(None),
        }
    }

    pub fn with_buffer_cap(mut self, cap: usize) -> Self {
        self.buffer_cap = cap;
        self
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    fn touch(&self) {
        let millis = self.epoch.elapsed().as_millis() as u64;
        self.last_activity_millis.store(millis, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_millis.load(Ordering::Relaxed);
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(last))
    }

    /// Drives the state machine; on entry to `Closed` cancels the stream's
    /// token, wakes blocked readers with EOF, and marks the send side
    /// closed.
    pub fn set_state(&self, cause: Cause) -> Result<StreamState, StreamError> {
        self.touch();
        let mut guard = self.state.lock();
        let next = guard.apply(cause)?;
        *guard = next;
        if let Cause::Reset(reason) = cause {
            *self.reset_reason.lock() = Some(reason);
        }
        // HalfClosed(remote) means the peer will send no more data; Closed
        // closes both directions. HalfClosed(local) closes only the send
        // side, leaving the receive side open for the peer's remaining data.
        if matches!(next, StreamState::HalfClosedRemote | StreamState::Closed) {
            let mut recv = self.recv.lock();
            recv.closed = true;
            self.recv_condvar.notify_all();
        }
        if matches!(next, StreamState::HalfClosedLocal | StreamState::Closed) {
            self.send_closed.store(true, Ordering::SeqCst);
        }
        if next.is_closed() {
            self.cancel.cancel();
        }
        Ok(next)
    }

    pub fn reset_reason(&self) -> Option<Reason> {
        *self.reset_reason.lock()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fails with STREAM_SELF_DEPENDENCY when `parent == self.id`.
    pub fn set_priority(
        &self,
        weight: u8,
        parent: u32,
        exclusive: bool,
    ) -> Result<(), StreamError> {
        if parent == self.id {
            return Err(StreamError::SelfDependency);
        }
        self.touch();
        *self.priority.lock() = Priority {
            weight,
            parent_id: parent,
            exclusive,
        };
        Ok(())
    }

    pub fn priority(&self) -> Priority {
        *self.priority.lock()
    }

    /// Appends to the send buffer; rejects when the send side is closed or
    /// the buffer cap would be exceeded.
    pub fn write(&self, data: &[u8]) -> Result<(), StreamError> {
        if self.send_closed.load(Ordering::SeqCst) {
            return Err(StreamError::SendSideClosed);
        }
        self.touch();
        let mut buffer = self.send_buffer.lock();
        if buffer.len() + data.len() > self.buffer_cap {
            return Err(StreamError::BufferCapExceeded);
        }
        buffer.extend(data.iter().copied());
        Ok(())
    }

    pub fn take_send_buffer(&self, max: usize) -> Vec<u8> {
        let mut buffer = self.send_buffer.lock();
        let take = max.min(buffer.len());
        buffer.drain(..take).collect()
    }

    /// Appends to the receive buffer under the same size guard and wakes
    /// blocked readers.
    pub fn receive_data(&self, data: &[u8]) -> Result<(), StreamError> {
        self.touch();
        let mut recv = self.recv.lock();
        if recv.data.len() + data.len() > self.buffer_cap {
            return Err(StreamError::BufferCapExceeded);
        }
        recv.data.extend(data.iter().copied());
        self.recv_condvar.notify_all();
        Ok(())
    }

    /// Blocks until data is available or the receive side closes; copies out
    /// up to `dst.len()` bytes, returning the count (0 means EOF).
    pub fn read(&self, dst: &mut [u8]) -> Result<usize, StreamError> {
        let mut recv = self.recv.lock();
        loop {
            if self.cancel.is_cancelled() && recv.data.is_empty() {
                return Err(StreamError::Cancelled);
            }
            if !recv.data.is_empty() {
                let n = dst.len().min(recv.data.len());
                for slot in dst.iter_mut().take(n) {
                    *slot = recv.data.pop_front().unwrap();
                }
                return Ok(n);
            }
            if recv.closed {
                return Ok(0);
            }
            self.recv_condvar.wait(&mut recv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Stream {
        Stream::new(1, 65_535, 65_535, CancelToken::new())
    }

    #[test]
    fn headers_without_end_stream_opens() {
        let s = stream();
        assert_eq!(
            s.set_state(Cause::HeadersNoEndStream).unwrap(),
            StreamState::Open
        );
    }

    #[test]
    fn received_headers_with_end_stream_half_closes_remote() {
        let s = stream();
        assert_eq!(
            s.set_state(Cause::HeadersEndStreamReceived).unwrap(),
            StreamState::HalfClosedRemote
        );
    }

    #[test]
    fn sent_headers_with_end_stream_half_closes_local() {
        // A bodyless local request/response: the send side closes, the
        // receive side (the peer's reply) stays open -- the inverse of the
        // received-side transition above.
        let s = stream();
        assert_eq!(
            s.set_state(Cause::HeadersEndStreamSent).unwrap(),
            StreamState::HalfClosedLocal
        );
    }

    #[test]
    fn closed_is_idempotent() {
        let s = stream();
        s.set_state(Cause::Reset(Reason::CANCEL)).unwrap();
        assert_eq!(
            s.set_state(Cause::Reset(Reason::CANCEL)).unwrap(),
            StreamState::Closed
        );
    }

    #[test]
    fn invalid_transition_rejected() {
        let s = stream();
        s.set_state(Cause::HeadersEndStreamReceived).unwrap();
        // HalfClosedRemote cannot receive EndStreamReceived again.
        assert_eq!(
            s.set_state(Cause::EndStreamReceived),
            Err(StreamError::InvalidTransition)
        );
    }

    #[test]
    fn reset_cancels_token_and_wakes_readers() {
        let s = stream();
        s.set_state(Cause::HeadersNoEndStream).unwrap();
        s.set_state(Cause::Reset(Reason::CANCEL)).unwrap();
        assert!(s.cancel_token().is_cancelled());
        assert_eq!(s.read(&mut [0u8; 4]), Err(StreamError::Cancelled));
    }

    #[test]
    fn read_returns_eof_after_graceful_close() {
        let s = stream();
        s.set_state(Cause::HeadersNoEndStream).unwrap();
        s.receive_data(b"hi").unwrap();
        s.set_state(Cause::EndStreamReceived).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(s.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"hi");
        assert_eq!(s.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_rejects_over_cap() {
        let s = Stream::new(1, 65_535, 65_535, CancelToken::new()).with_buffer_cap(4);
        assert_eq!(s.write(b"12345"), Err(StreamError::BufferCapExceeded));
    }

    #[test]
    fn set_priority_rejects_self_dependency() {
        let s = stream();
        assert_eq!(
            s.set_priority(10, 1, false),
            Err(StreamError::SelfDependency)
        );
    }
}
