//! FIFO waiter queue for the HTTP/1.1 pool's `acquire` (spec §4.10 "wait
//! ... FIFO waiters", §5 "pool waiters block on a FIFO semaphore honoring
//! cancellation").

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::h2::stream::CancelToken;

use super::PoolError;

/// Cancellation is polled rather than broadcast-woken: a waiter rechecks
/// its token at least this often even with no deadline, so an external
/// `cancel()` is noticed promptly without every caller needing a handle to
/// every sleeping waiter's condvar.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Slot {
    ready: Mutex<bool>,
    condvar: Condvar,
}

/// A queue of callers waiting for a pool slot to free up, woken in the
/// order they arrived.
#[derive(Default)]
pub struct FifoWaiters {
    queue: Mutex<std::collections::VecDeque<Arc<Slot>>>,
}

impl FifoWaiters {
    pub fn new() -> Self {
        FifoWaiters {
            queue: Mutex::new(std::collections::VecDeque::new()),
        }
    }

    /// Enqueues a waiter and blocks until [`FifoWaiters::wake_one`] signals
    /// it, the deadline elapses, or `cancel` fires.
    pub fn wait(&self, deadline: Option<Instant>, cancel: &CancelToken) -> Result<(), PoolError> {
        let slot = Arc::new(Slot {
            ready: Mutex::new(false),
            condvar: Condvar::new(),
        });
        self.queue.lock().push_back(slot.clone());

        let mut ready = slot.ready.lock();
        loop {
            if *ready {
                return Ok(());
            }
            if cancel.is_cancelled() {
                self.remove(&slot);
                return Err(PoolError::Cancelled);
            }
            let wait_for = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        self.remove(&slot);
                        return Err(PoolError::AcquireTimeout);
                    }
                    (d - now).min(CANCEL_POLL_INTERVAL)
                }
                None => CANCEL_POLL_INTERVAL,
            };
            let result = slot.condvar.wait_for(&mut ready, wait_for);
            if result.timed_out() && !*ready {
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        self.remove(&slot);
                        return Err(PoolError::AcquireTimeout);
                    }
                }
                // Otherwise this was just a cancellation-poll tick; loop
                // around to recheck `cancel` and the deadline.
            }
        }
    }

    fn remove(&self, slot: &Arc<Slot>) {
        let mut queue = self.queue.lock();
        queue.retain(|s| !Arc::ptr_eq(s, slot));
    }

    /// Wakes the longest-waiting caller, if any, preserving FIFO order.
    pub fn wake_one(&self) {
        let next = self.queue.lock().pop_front();
        if let Some(slot) = next {
            *slot.ready.lock() = true;
            slot.condvar.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn wake_one_releases_the_first_waiter() {
        let waiters = StdArc::new(FifoWaiters::new());
        let cancel = CancelToken::new();
        let w2 = waiters.clone();
        let c2 = cancel.clone();
        let handle = thread::spawn(move || w2.wait(None, &c2));

        // Give the spawned thread a chance to enqueue.
        while waiters.is_empty() {
            thread::yield_now();
        }
        waiters.wake_one();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn cancellation_wakes_a_waiting_caller() {
        let waiters = StdArc::new(FifoWaiters::new());
        let cancel = CancelToken::new();
        let w2 = waiters.clone();
        let c2 = cancel.clone();
        let handle = thread::spawn(move || w2.wait(None, &c2));
        while waiters.is_empty() {
            thread::yield_now();
        }
        cancel.cancel();
        assert_eq!(handle.join().unwrap(), Err(PoolError::Cancelled));
    }

    #[test]
    fn deadline_elapses_with_timeout_error() {
        let waiters = FifoWaiters::new();
        let cancel = CancelToken::new();
        let result = waiters.wait(Some(Instant::now() + Duration::from_millis(10)), &cancel);
        assert_eq!(result, Err(PoolError::AcquireTimeout));
    }
}
