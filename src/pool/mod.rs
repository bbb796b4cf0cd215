//! Pooled-object discipline (spec §4.9, C9) and the HTTP/1.1 per-host
//! connection pool's shared waiter machinery (spec §4.10, C10).
//!
//! Frequently allocated objects -- requests, responses, header lists,
//! buffers, line readers, stream structs, dynamic-table entry nodes -- are
//! obtained from size-classed pools and released on all exit paths (scoped
//! acquisition via RAII guards rather than an explicit `release()` call a
//! caller could forget). Grounded on `RephlexZero-strata`'s capacity-bounded
//! `PacketPool` (other_examples): a bounded backing store with an explicit
//! ceiling, here a reusable free-list rather than a slab since objects are
//! acquired/released by the caller that created them, never referenced by an
//! external handle.

pub mod object_pool;
pub mod waiter;

pub use object_pool::{ObjectPool, Poolable, PoolGuard};
pub use waiter::FifoWaiters;

use std::fmt;

/// Errors surfaced by the HTTP/1.1 connection pool (spec §4.10/§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `acquire` waited past its deadline for a free slot or idle
    /// connection.
    AcquireTimeout,
    /// The caller's cancellation token fired while waiting.
    Cancelled,
    /// `dial` failed; the inner message is the transport's own error text.
    DialFailure(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::AcquireTimeout => write!(f, "timed out waiting for a pooled connection"),
            PoolError::Cancelled => write!(f, "pool acquisition cancelled"),
            PoolError::DialFailure(msg) => write!(f, "dial failed: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}
