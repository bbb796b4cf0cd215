//! Connection (spec §4.8, C8): sharded stream map, settings negotiation,
//! GOAWAY, idle watchdog, and the security governor. Transport-agnostic --
//! generic over [`crate::transport::Transport`] -- and blocking rather than
//! `Future`/`Poll`-based, per spec §5's scheduling model.

mod governor;
mod shard_map;

pub use governor::{GovernorError, SecurityGovernor};
pub use shard_map::ShardedStreamMap;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::Http2Config;
use crate::h2::error::{Error as H2Error, Initiator, Reason};
use crate::h2::flow_control::{FlowController, Window};
use crate::h2::frame::{Frame, FrameError, Setting, SettingId};
use crate::h2::priority::{PriorityError, PriorityTree};
use crate::h2::settings::Settings;
use crate::h2::stream::{CancelToken, Cause, Stream, StreamError};
use crate::hpack::{Decoder, Encoder};
use crate::stats::{ConnectionStats, ConnectionStatsSnapshot};
use crate::transport::Transport;
use crate::wire::{FrameHeader, FRAME_HEADER_LEN};

/// Which side of the connection this engine is acting as; determines the
/// parity of self-initiated stream ids (spec §3 "Connection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GoAwayState {
    Open,
    GoingAway { last_stream_id: u32, reason: Reason },
}

/// An HTTP/2 connection: the stream map, negotiated settings, HPACK state,
/// priority tree, flow-control windows, and the security governor that
/// together implement spec §4.8.
pub struct Connection<T: Transport> {
    role: Role,
    transport: Mutex<T>,
    next_stream_id: AtomicU32,
    local_settings: RwLock<Settings>,
    remote_settings: RwLock<Settings>,
    encoder: Mutex<Encoder>,
    decoder: Mutex<Decoder>,
    priority_tree: Mutex<PriorityTree>,
    streams: ShardedStreamMap,
    send_window: Mutex<Window>,
    recv_window: Mutex<Window>,
    goaway: Mutex<GoAwayState>,
    last_activity_millis: AtomicU64,
    epoch: Instant,
    cancel: CancelToken,
    governor: SecurityGovernor,
    stats: ConnectionStats,
    config: Http2Config,
}

impl<T: Transport> Connection<T> {
    pub fn new(role: Role, transport: T, config: Http2Config) -> Self {
        let local = Settings {
            initial_window_size: config.initial_window_size,
            max_frame_size: config.max_frame_size,
            header_table_size: config.header_table_size as u32,
            ..Settings::default()
        };
        let governor = SecurityGovernor::new(
            config.max_connection_buffer,
            config.max_priority_updates_per_sec,
            config.priority_rate_window,
            config.max_stream_buffer,
        );
        Connection {
            role,
            transport: Mutex::new(transport),
            next_stream_id: AtomicU32::new(match role {
                Role::Client => 1,
                Role::Server => 2,
            }),
            local_settings: RwLock::new(local),
            remote_settings: RwLock::new(Settings::default()),
            encoder: Mutex::new(Encoder::new(config.header_table_size)),
            decoder: Mutex::new(Decoder::new(config.header_table_size)),
            priority_tree: Mutex::new(PriorityTree::new()),
            streams: ShardedStreamMap::new(),
            send_window: Mutex::new(Window::new(65_535)),
            recv_window: Mutex::new(Window::new(65_535)),
            goaway: Mutex::new(GoAwayState::Open),
            last_activity_millis: AtomicU64::new(0),
            epoch: Instant::now(),
            cancel: CancelToken::new(),
            governor,
            stats: ConnectionStats::default(),
            config,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn stats(&self) -> ConnectionStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
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

    pub fn is_going_away(&self) -> bool {
        !matches!(*self.goaway.lock(), GoAwayState::Open)
    }

    // ---- stream lifecycle -------------------------------------------------

    /// Allocates the next self-initiated stream id and registers a new
    /// stream in the sharded map. Fails (returns `None`) if the connection
    /// is going away (spec §4.8 "A closed connection refuses new
    /// createStream").
    pub fn create_stream(&self) -> Option<Arc<Stream>> {
        if self.is_going_away() {
            return None;
        }
        let id = self.next_stream_id.fetch_add(2, Ordering::SeqCst);
        let initial_send = self.remote_settings.read().initial_window_size;
        let initial_recv = self.local_settings.read().initial_window_size;
        let stream = Arc::new(
            Stream::new(id, initial_send, initial_recv, self.cancel.clone())
                .with_buffer_cap(self.governor.stream_buffer_cap),
        );
        self.priority_tree.lock().add_stream(id, 0, 15, false);
        self.streams.set(id, stream.clone());
        self.stats.record_stream_created(1);
        self.touch();
        Some(stream)
    }

    /// Registers a peer-initiated stream (first HEADERS) at a specific id.
    pub fn accept_stream(&self, id: u32) -> Arc<Stream> {
        let initial_send = self.remote_settings.read().initial_window_size;
        let initial_recv = self.local_settings.read().initial_window_size;
        let stream = Arc::new(
            Stream::new(id, initial_send, initial_recv, self.cancel.clone())
                .with_buffer_cap(self.governor.stream_buffer_cap),
        );
        self.priority_tree.lock().add_stream(id, 0, 15, false);
        self.streams.set(id, stream.clone());
        self.stats.record_stream_created(1);
        self.touch();
        stream
    }

    pub fn get_stream(&self, id: u32) -> Option<Arc<Stream>> {
        self.streams.get(id)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn destroy_stream(&self, id: u32) {
        if self.streams.delete(id).is_some() {
            self.priority_tree.lock().remove_stream(id);
            self.stats.record_stream_closed(1);
        }
    }

    // ---- security governor -------------------------------------------------

    /// Admits `n` bytes of new buffered data against the connection-wide
    /// ceiling before a stream accepts it (spec §4.8 "Connection buffer
    /// counter"). Streams hold only a capability reference to this check --
    /// they never own the counter themselves (spec §9).
    pub fn admit_buffer_growth(&self, n: usize) -> Result<(), GovernorError> {
        self.governor.buffer.try_grow(n as u64)
    }

    /// Called after a stream's `read` drains bytes out of its buffer.
    pub fn release_buffer(&self, n: usize) {
        self.governor.buffer.shrink(n as u64);
    }

    pub fn buffer_in_use(&self) -> u64 {
        self.governor.buffer.current()
    }

    // ---- priority -----------------------------------------------------------

    /// Applies a PRIORITY update, consulting the rate limiter first (spec
    /// §4.7 "the lock also serializes rate-limit admission").
    pub fn update_priority(
        &self,
        id: u32,
        parent: u32,
        weight: u8,
        exclusive: bool,
    ) -> Result<(), PriorityUpdateError> {
        self.governor
            .priority_rate
            .try_admit()
            .map_err(|_| PriorityUpdateError::RateLimitExceeded)?;
        let mut tree = self.priority_tree.lock();
        tree.update_priority(id, parent, weight, exclusive)
            .map_err(PriorityUpdateError::Priority)?;
        if let Some(stream) = self.streams.get(id) {
            let _ = stream.set_priority(weight, parent, exclusive);
        }
        Ok(())
    }

    pub fn calculate_weight(&self, id: u32) -> u16 {
        self.priority_tree.lock().calculate_weight(id)
    }

    // ---- settings -------------------------------------------------------

    /// Applies a peer SETTINGS frame's parameters: updates the remote
    /// settings record, adjusts the encoder's dynamic table size, and
    /// propagates an INITIAL_WINDOW_SIZE delta to every open stream's send
    /// window (spec §4.8 `updateLocal`... mirrored here for the remote
    /// side, since both directions apply the §4.5 propagation rule).
    pub fn apply_remote_settings(&self, params: &[Setting]) -> Result<(), H2Error> {
        let delta = {
            let mut remote = self.remote_settings.write();
            remote
                .apply(params)
                .map_err(|e| H2Error::go_away(self.last_processed_stream(), e.0, Initiator::Remote))?
        };
        for setting in params {
            if setting.id == SettingId::HeaderTableSize {
                self.encoder
                    .lock()
                    .set_max_dynamic_table_size(setting.value as usize);
            }
        }
        if delta != 0 {
            self.propagate_window_delta(delta)?;
        }
        self.touch();
        Ok(())
    }

    /// Applies a local settings change (the caller's own desired
    /// configuration, e.g. shrinking `SETTINGS_HEADER_TABLE_SIZE`):
    /// adjusts the decoder's table size and validates bounds the same way
    /// `apply_remote_settings` does for the peer's frame.
    pub fn update_local_settings(&self, params: &[Setting]) -> Result<(), H2Error> {
        let mut local = self.local_settings.write();
        local
            .apply(params)
            .map_err(|e| H2Error::go_away(self.last_processed_stream(), e.0, Initiator::Library))?;
        for setting in params {
            if setting.id == SettingId::HeaderTableSize {
                self.decoder
                    .lock()
                    .set_max_dynamic_table_size(setting.value as usize);
            }
        }
        Ok(())
    }

    fn propagate_window_delta(&self, delta: i64) -> Result<(), H2Error> {
        let mut overflowed = Vec::new();
        self.streams.for_each(|stream| {
            if stream.send_window.lock().apply_settings_delta(delta).is_err() {
                overflowed.push(stream.id);
            }
            true
        });
        if let Some(&id) = overflowed.first() {
            return Err(H2Error::reset(id, Reason::FLOW_CONTROL_ERROR, Initiator::Library));
        }
        Ok(())
    }

    fn last_processed_stream(&self) -> u32 {
        self.next_stream_id.load(Ordering::SeqCst).saturating_sub(2)
    }

    // ---- flow control -----------------------------------------------------

    /// Deducts from both the connection and the named stream's send
    /// windows, returning the number of bytes actually sendable now (spec
    /// §4.5 `sendData`).
    pub fn reserve_send_window(&self, stream: &Stream, len: usize) -> Result<usize, H2Error> {
        let mut conn = self.send_window.lock();
        let mut stream_window = stream.send_window.lock();
        FlowController::send_data(&mut conn, &mut stream_window, len)
            .map_err(|_| H2Error::go_away(self.last_processed_stream(), Reason::FLOW_CONTROL_ERROR, Initiator::Library))
    }

    pub fn apply_window_update(&self, stream_id: u32, increment: u32) -> Result<(), H2Error> {
        if stream_id == 0 {
            self.send_window
                .lock()
                .increment(increment)
                .map_err(|_| H2Error::go_away(self.last_processed_stream(), Reason::FLOW_CONTROL_ERROR, Initiator::Remote))?;
        } else if let Some(stream) = self.streams.get(stream_id) {
            stream
                .send_window
                .lock()
                .increment(increment)
                .map_err(|_| H2Error::reset(stream_id, Reason::FLOW_CONTROL_ERROR, Initiator::Remote))?;
        }
        Ok(())
    }

    // ---- GOAWAY -------------------------------------------------------------

    /// Marks the connection as going away: subsequent `create_stream` calls
    /// fail, and the cancellation token fires so blocked streams and pool
    /// waiters wake (spec §4.8 "goAway").
    pub fn go_away(&self, last_stream_id: u32, reason: Reason) {
        tracing::warn!(last_stream_id, ?reason, "connection going away");
        *self.goaway.lock() = GoAwayState::GoingAway {
            last_stream_id,
            reason,
        };
        self.cancel.cancel();
    }

    pub fn goaway_info(&self) -> Option<(u32, Reason)> {
        match *self.goaway.lock() {
            GoAwayState::GoingAway { last_stream_id, reason } => Some((last_stream_id, reason)),
            GoAwayState::Open => None,
        }
    }

    // ---- idle watchdog ------------------------------------------------------

    /// One tick of the idle watchdog (spec §4.8 "Idle watchdog"): RST-s and
    /// removes streams idle past `stream_idle_timeout`, and reports whether
    /// the connection itself has been idle past `connection_idle_timeout`.
    pub fn idle_watchdog_tick(&self) -> bool {
        let idle_ids = self.streams.ids_idle_longer_than(self.config.stream_idle_timeout);
        if !idle_ids.is_empty() {
            tracing::debug!(count = idle_ids.len(), "reaping idle streams");
        }
        for id in idle_ids {
            if let Some(stream) = self.streams.get(id) {
                let _ = stream.set_state(Cause::Reset(Reason::CANCEL));
            }
            self.destroy_stream(id);
        }
        self.idle_for() > self.config.connection_idle_timeout
    }

    // ---- frame I/O ------------------------------------------------------

    /// Writes a HEADERS frame's payload (already HPACK-encoded by the
    /// caller) preceded by its frame header.
    pub fn send_headers(
        &self,
        headers: &crate::h2::frame::Headers<'_>,
        deadline: Option<Instant>,
    ) -> std::io::Result<()> {
        let mut payload = Vec::new();
        headers.emit(&mut payload);
        self.send_raw(0x1, headers.flags(), headers.stream_id, &payload, deadline)
    }

    /// Writes a DATA frame, having already reserved flow-control window via
    /// [`Connection::reserve_send_window`].
    pub fn send_data(
        &self,
        data: &crate::h2::frame::Data<'_>,
        deadline: Option<Instant>,
    ) -> std::io::Result<()> {
        let mut payload = Vec::new();
        data.emit(&mut payload);
        self.send_raw(0x0, data.flags(), data.stream_id, &payload, deadline)
    }

    pub fn send_settings(&self, settings: &crate::h2::frame::Settings, deadline: Option<Instant>) -> std::io::Result<()> {
        let mut payload = Vec::new();
        settings.emit(&mut payload);
        self.send_raw(0x4, settings.flags(), 0, &payload, deadline)
    }

    pub fn send_rst_stream(&self, stream_id: u32, reason: Reason, deadline: Option<Instant>) -> std::io::Result<()> {
        let frame = crate::h2::frame::RstStream::new(stream_id, reason);
        let mut payload = Vec::new();
        frame.emit(&mut payload);
        self.send_raw(0x3, 0, stream_id, &payload, deadline)
    }

    pub fn send_go_away(&self, last_stream_id: u32, reason: Reason, debug_data: &[u8], deadline: Option<Instant>) -> std::io::Result<()> {
        let frame = crate::h2::frame::GoAway::new(last_stream_id, reason, debug_data);
        let mut payload = Vec::new();
        frame.emit(&mut payload);
        self.send_raw(0x7, 0, 0, &payload, deadline)
    }

    pub fn send_window_update(&self, stream_id: u32, increment: u32, deadline: Option<Instant>) -> std::io::Result<()> {
        let frame = crate::h2::frame::WindowUpdate::new(stream_id, increment);
        let mut payload = Vec::new();
        frame.emit(&mut payload);
        self.send_raw(0x8, 0, stream_id, &payload, deadline)
    }

    pub fn send_ping(&self, ping: &crate::h2::frame::Ping, deadline: Option<Instant>) -> std::io::Result<()> {
        let mut payload = Vec::new();
        ping.emit(&mut payload);
        self.send_raw(0x6, ping.flags(), 0, &payload, deadline)
    }

    fn send_raw(
        &self,
        kind: u8,
        flags: u8,
        stream_id: u32,
        payload: &[u8],
        deadline: Option<Instant>,
    ) -> std::io::Result<()> {
        let header = FrameHeader {
            length: payload.len() as u32,
            kind,
            flags,
            stream_id,
        };
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        let mut head_buf = [0u8; FRAME_HEADER_LEN];
        header.emit(&mut head_buf);
        out.extend_from_slice(&head_buf);
        out.extend_from_slice(payload);
        self.transport.lock().write_with_deadline(&out, deadline)?;
        self.stats.record_frame_sent(1);
        self.stats.record_bytes_sent(out.len() as u64);
        self.touch();
        Ok(())
    }

    /// Blocks until one full frame header + payload has arrived, returning
    /// the raw bytes for the caller to hand to [`Frame::parse`]. Returns
    /// `Ok(None)` on clean EOF.
    pub fn receive_raw_frame(&self, deadline: Option<Instant>) -> std::io::Result<Option<Vec<u8>>> {
        let mut transport = self.transport.lock();
        let mut head_buf = [0u8; FRAME_HEADER_LEN];
        if !read_exact(&mut *transport, &mut head_buf, deadline)? {
            return Ok(None);
        }
        let header = FrameHeader::parse(&head_buf);
        let mut payload = vec![0u8; header.length as usize];
        if !payload.is_empty() && !read_exact(&mut *transport, &mut payload, deadline)? {
            return Ok(None);
        }
        drop(transport);
        self.stats.record_frame_received(1);
        self.stats
            .record_bytes_received((FRAME_HEADER_LEN + payload.len()) as u64);
        self.touch();
        let mut full = head_buf.to_vec();
        full.extend_from_slice(&payload);
        Ok(Some(full))
    }
}

/// Fills `buf` completely, looping over short reads; `Ok(false)` means EOF
/// was hit before any byte of this read was consumed (a clean frame
/// boundary), matching how [`crate::h2::connection::Connection::receive_raw_frame`]
/// distinguishes "no more frames" from a truncated one.
fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    deadline: Option<Instant>,
) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read_with_deadline(&mut buf[filled..], deadline)?;
        if n == 0 {
            return Ok(filled == 0);
        }
        filled += n;
    }
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityUpdateError {
    RateLimitExceeded,
    Priority(PriorityError),
}

impl std::fmt::Display for PriorityUpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityUpdateError::RateLimitExceeded => write!(f, "PRIORITY rate limit exceeded"),
            PriorityUpdateError::Priority(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PriorityUpdateError {}

impl From<FrameError> for H2Error {
    fn from(e: FrameError) -> Self {
        H2Error::go_away(0, e.reason(), Initiator::Remote)
    }
}
