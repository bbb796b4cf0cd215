//! HTTP/1.1 connection pool (spec §4.10, C10): per-host admission,
//! idle reclamation, health checking, FIFO acquisition ordering once a
//! host is at its connection cap.
//!
//! Idle connections per host live in a [`slab::Slab`] rather than a
//! `Vec`/`VecDeque`: the idle reaper and health prober both need to remove
//! an arbitrary entry discovered mid-scan without shifting the rest, which
//! a slab gives for free and a `Vec::retain` pass would otherwise require
//! re-deriving.

use std::collections::HashMap;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slab::Slab;

use crate::config::PoolConfig;
use crate::h1::health::HealthChecker;
use crate::h2::stream::CancelToken;
use crate::pool::{FifoWaiters, PoolError};
use crate::stats::PoolStats;
use crate::transport::Transport;

/// The narrow "dial a new connection" collaborator (spec §4.10's
/// implicit dependency, named per spec §1's "external collaborators with
/// named interfaces"). Kept separate from [`Transport`] since dialing
/// needs a destination string the established connection no longer does.
pub trait Dialer<T: Transport>: Send + Sync {
    fn dial(&self, host_port: &str, deadline: Option<Instant>) -> io::Result<T>;
}

/// One live connection owned by the pool (spec §3 "Pooled connection").
pub struct PooledConn<T: Transport> {
    pub transport: T,
    pub host_port: Box<str>,
    /// Bytes already pulled off `transport` by the previous request's
    /// [`crate::h1::line_reader::LineReader`] but not yet consumed -- e.g. a
    /// pipelined next response read ahead into the same underlying `read()`.
    /// Carried forward so a reused connection doesn't lose them.
    pub read_leftover: Vec<u8>,
    healthy: bool,
    request_count: u64,
    last_used: Instant,
}

impl<T: Transport> PooledConn<T> {
    fn new(transport: T, host_port: Box<str>) -> Self {
        PooledConn {
            transport,
            host_port,
            read_leftover: Vec::new(),
            healthy: true,
            request_count: 0,
            last_used: Instant::now(),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }
}

struct HostPool<T: Transport> {
    idle: Mutex<Slab<PooledConn<T>>>,
    total: AtomicUsize,
    waiters: FifoWaiters,
}

impl<T: Transport> HostPool<T> {
    fn new() -> Self {
        HostPool {
            idle: Mutex::new(Slab::new()),
            total: AtomicUsize::new(0),
            waiters: FifoWaiters::new(),
        }
    }

    /// Pops the first healthy idle connection, discarding (and accounting
    /// for) any unhealthy ones found along the way.
    fn pop_healthy_idle(&self) -> Option<PooledConn<T>> {
        loop {
            let mut idle = self.idle.lock();
            let key = idle.iter().next().map(|(k, _)| k)?;
            let conn = idle.remove(key);
            drop(idle);
            if conn.healthy {
                return Some(conn);
            }
            drop(conn);
            self.total.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn try_reserve_slot(&self, max: usize) -> bool {
        let mut current = self.total.load(Ordering::SeqCst);
        loop {
            if current >= max {
                return false;
            }
            match self.total.compare_exchange_weak(current, current + 1, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn release_reserved_slot(&self) {
        self.total.fetch_sub(1, Ordering::SeqCst);
    }

    fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    fn total_len(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Per-host sub-pools keyed by `host:port` (spec §4.10).
pub struct Pool<T: Transport, D: Dialer<T>> {
    hosts: Mutex<HashMap<Box<str>, Arc<HostPool<T>>>>,
    dialer: D,
    config: PoolConfig,
    health_checker: Option<HealthChecker>,
}

impl<T: Transport, D: Dialer<T>> Pool<T, D> {
    pub fn new(dialer: D, config: PoolConfig) -> Self {
        Pool {
            hosts: Mutex::new(HashMap::new()),
            dialer,
            config,
            health_checker: None,
        }
    }

    pub fn with_health_checker(mut self, checker: HealthChecker) -> Self {
        self.health_checker = Some(checker);
        self
    }

    fn host_entry(&self, host_port: &str) -> Arc<HostPool<T>> {
        let mut hosts = self.hosts.lock();
        hosts.entry(host_port.into()).or_insert_with(|| Arc::new(HostPool::new())).clone()
    }

    /// `acquire` per spec §4.10: pop an idle connection, else dial under
    /// the per-host cap, else block (honoring `cancel` and `deadline`) for
    /// a release.
    pub fn acquire(&self, host_port: &str, cancel: &CancelToken, deadline: Option<Instant>) -> Result<Checkout<'_, T, D>, PoolError> {
        loop {
            let host = self.host_entry(host_port);

            if let Some(conn) = host.pop_healthy_idle() {
                return Ok(Checkout::new(self, host_port.into(), conn));
            }

            if host.try_reserve_slot(self.config.max_conns_per_host) {
                let dial_deadline = deadline
                    .map(|d| d.min(Instant::now() + self.config.dial_timeout))
                    .unwrap_or_else(|| Instant::now() + self.config.dial_timeout);
                match self.dialer.dial(host_port, Some(dial_deadline)) {
                    Ok(transport) => {
                        let conn = PooledConn::new(transport, host_port.into());
                        return Ok(Checkout::new(self, host_port.into(), conn));
                    }
                    Err(e) => {
                        tracing::warn!(host_port, error = %e, "dial failed");
                        host.release_reserved_slot();
                        return Err(PoolError::DialFailure(e.to_string()));
                    }
                }
            }

            host.waiters.wait(deadline, cancel)?;
        }
    }

    fn release(&self, host_port: &str, mut conn: PooledConn<T>, reusable: bool) {
        let host = self.host_entry(host_port);
        conn.last_used = Instant::now();
        if reusable && conn.healthy && host.idle_len() < self.config.max_idle_conns_per_host {
            host.idle.lock().insert(conn);
            host.waiters.wake_one();
            return;
        }
        let _ = conn.transport.close();
        host.release_reserved_slot();
        host.waiters.wake_one();
    }

    /// One tick of the idle reaper (spec §4.10 "A background reaper fires
    /// every `idle_check_interval`"): closes any idle connection older
    /// than `max_idle_time`. The caller supplies the schedule; this crate
    /// owns no timer of its own (transport/scheduling is an external
    /// collaborator per spec §1).
    pub fn reap_idle_tick(&self) {
        let hosts: Vec<_> = self.hosts.lock().values().cloned().collect();
        let now = Instant::now();
        for host in hosts {
            let stale: Vec<usize> = {
                let idle = host.idle.lock();
                idle.iter()
                    .filter(|(_, conn)| now.duration_since(conn.last_used) > self.config.max_idle_time)
                    .map(|(k, _)| k)
                    .collect()
            };
            for key in stale {
                let conn = host.idle.lock().try_remove(key);
                if let Some(mut conn) = conn {
                    tracing::debug!(host_port = %conn.host_port, "closing stale idle connection");
                    let _ = conn.transport.close();
                    host.release_reserved_slot();
                }
            }
        }
    }

    /// One tick of the health prober (spec §4.10 "If `health_checker` is
    /// set, a background prober runs..."): no-op if no checker is
    /// configured.
    pub fn health_check_tick(&self) {
        let Some(checker) = &self.health_checker else { return };
        let hosts: Vec<_> = self.hosts.lock().values().cloned().collect();
        for host in hosts {
            let keys: Vec<usize> = host.idle.lock().iter().map(|(k, _)| k).collect();
            for key in keys {
                let healthy = {
                    let mut idle = host.idle.lock();
                    match idle.get_mut(key) {
                        Some(conn) => checker.check(&mut conn.transport),
                        None => continue,
                    }
                };
                if !healthy {
                    if let Some(mut conn) = host.idle.lock().try_remove(key) {
                        tracing::info!(host_port = %conn.host_port, "health check failed, closing connection");
                        let _ = conn.transport.close();
                        host.release_reserved_slot();
                    }
                }
            }
        }
    }

    /// Aggregate pool statistics (spec §6 "Statistics surface").
    pub fn stats(&self) -> PoolStats {
        let hosts = self.hosts.lock();
        let total: usize = hosts.values().map(|h| h.total_len()).sum();
        let idle: usize = hosts.values().map(|h| h.idle_len()).sum();
        PoolStats { total, active: total - idle, idle }
    }

    /// Per-host breakdown (spec §6 "per-host breakdown").
    pub fn per_host_stats(&self) -> Vec<(Box<str>, PoolStats)> {
        self.hosts
            .lock()
            .iter()
            .map(|(host, pool)| {
                let total = pool.total_len();
                let idle = pool.idle_len();
                (host.clone(), PoolStats { total, active: total - idle, idle })
            })
            .collect()
    }
}

/// A connection checked out of the pool. Returned to the idle set on drop
/// if [`Checkout::mark_unreusable`] was never called (spec §4.9 "scoped
/// acquisition with release on all exit paths").
pub struct Checkout<'p, T: Transport, D: Dialer<T>> {
    pool: &'p Pool<T, D>,
    host_port: Box<str>,
    conn: Option<PooledConn<T>>,
    reusable: bool,
}

impl<'p, T: Transport, D: Dialer<T>> Checkout<'p, T, D> {
    fn new(pool: &'p Pool<T, D>, host_port: Box<str>, conn: PooledConn<T>) -> Self {
        Checkout { pool, host_port, conn: Some(conn), reusable: true }
    }

    /// Records one more request served on this connection (spec §3
    /// "Pooled connection" -- request count).
    pub fn record_request(&mut self) {
        if let Some(conn) = &mut self.conn {
            conn.request_count += 1;
        }
    }

    /// Marks the connection unfit for reuse: an I/O error occurred, the
    /// peer sent `Connection: close`, or the body was read until EOF
    /// (spec §4.11 "Connection lifecycle per request").
    pub fn mark_unreusable(&mut self) {
        self.reusable = false;
    }

    pub fn mark_unhealthy(&mut self) {
        if let Some(conn) = &mut self.conn {
            conn.healthy = false;
        }
        self.reusable = false;
    }
}

impl<'p, T: Transport, D: Dialer<T>> Deref for Checkout<'p, T, D> {
    type Target = PooledConn<T>;
    fn deref(&self) -> &PooledConn<T> {
        self.conn.as_ref().expect("connection taken before drop")
    }
}

impl<'p, T: Transport, D: Dialer<T>> DerefMut for Checkout<'p, T, D> {
    fn deref_mut(&mut self) -> &mut PooledConn<T> {
        self.conn.as_mut().expect("connection taken before drop")
    }
}

impl<'p, T: Transport, D: Dialer<T>> Drop for Checkout<'p, T, D> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(&self.host_port, conn, self.reusable);
        }
    }
}
