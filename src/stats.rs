//! Statistics surface (spec §6): atomic counters read via relaxed loads,
//! mirroring the teacher's `proto::Connection` frame/byte counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-connection counters (spec §6 "Per connection").
#[derive(Default)]
pub struct ConnectionStats {
    streams_created: AtomicU64,
    streams_closed: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    errors_sent: AtomicU64,
    errors_received: AtomicU64,
}

/// Snapshot of [`ConnectionStats`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatsSnapshot {
    pub streams_created: u64,
    pub streams_closed: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors_sent: u64,
    pub errors_received: u64,
}

macro_rules! counter_ops {
    ($field:ident, $inc:ident) => {
        pub fn $inc(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }
    };
}

impl ConnectionStats {
    counter_ops!(streams_created, record_stream_created);
    counter_ops!(streams_closed, record_stream_closed);
    counter_ops!(frames_sent, record_frame_sent);
    counter_ops!(frames_received, record_frame_received);
    counter_ops!(bytes_sent, record_bytes_sent);
    counter_ops!(bytes_received, record_bytes_received);
    counter_ops!(errors_sent, record_error_sent);
    counter_ops!(errors_received, record_error_received);

    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            streams_created: self.streams_created.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors_sent: self.errors_sent.load(Ordering::Relaxed),
            errors_received: self.errors_received.load(Ordering::Relaxed),
        }
    }
}

/// Per-pool counters (spec §6 "Per pool"): total/active/idle connections,
/// with a per-host breakdown built on demand from the pool's own state
/// (see [`crate::h1::pool::Pool::stats`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ConnectionStats::default();
        stats.record_frame_sent(1);
        stats.record_frame_sent(1);
        stats.record_bytes_sent(100);
        let snap = stats.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.bytes_sent, 100);
    }
}
