//! Generic size-classed object pool (spec §4.9).
//!
//! A released object is reset (length fields to zero, capacity retained)
//! rather than dropped, so the pool amortizes allocation across requests.
//! Oversize objects -- ones that grew past the class ceiling while in use --
//! are dropped instead of recycled, per spec §4.9, to keep the pool's
//! resident memory bounded against one abnormally large request.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// A type that can live in an [`ObjectPool`]: must be cheaply resettable to
/// an empty-but-capacity-retaining state, and able to report whether it has
/// outgrown the size class it belongs to.
pub trait Poolable: Default {
    /// Clears contents while keeping any backing allocation.
    fn reset(&mut self);

    /// Whether this instance has grown beyond its pool's size-class
    /// ceiling and should be dropped instead of recycled.
    fn is_oversized(&self) -> bool {
        false
    }
}

/// A bounded free-list of `T`, guarded by a single mutex (pool churn is
/// expected to be rare compared to the hot path it's feeding).
pub struct ObjectPool<T: Poolable> {
    free: Mutex<Vec<T>>,
    max_free: usize,
}

impl<T: Poolable> ObjectPool<T> {
    pub fn new(max_free: usize) -> Self {
        ObjectPool {
            free: Mutex::new(Vec::new()),
            max_free,
        }
    }

    /// Acquires an object: a recycled one if the free list isn't empty,
    /// otherwise a fresh `T::default()`. Returned as a guard that resets and
    /// returns the object to the pool on drop (scoped acquisition, spec
    /// §4.9), unless the object is oversized.
    pub fn acquire(&self) -> PoolGuard<'_, T> {
        let item = self.free.lock().pop().unwrap_or_default();
        PoolGuard {
            pool: self,
            item: Some(item),
        }
    }

    fn release(&self, mut item: T) {
        if item.is_oversized() {
            return;
        }
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_free {
            free.push(item);
        }
    }

    /// Number of objects currently sitting idle in the free list.
    pub fn idle_len(&self) -> usize {
        self.free.lock().len()
    }
}

/// RAII handle returned by [`ObjectPool::acquire`]. Releases the object back
/// to its pool on every exit path -- normal return, early `?`, or panic
/// unwind -- so callers never need a manual release call.
pub struct PoolGuard<'a, T: Poolable> {
    pool: &'a ObjectPool<T>,
    item: Option<T>,
}

impl<'a, T: Poolable> Deref for PoolGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().expect("item taken before drop")
    }
}

impl<'a, T: Poolable> DerefMut for PoolGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("item taken before drop")
    }
}

impl<'a, T: Poolable> Drop for PoolGuard<'a, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

/// A reusable byte buffer; oversize buffers (beyond `class_ceiling`) are
/// dropped rather than pooled (spec §4.9).
pub struct PooledBuffer {
    pub bytes: Vec<u8>,
    class_ceiling: usize,
}

impl PooledBuffer {
    pub const DEFAULT_CEILING: usize = 64 * 1024;
}

impl Default for PooledBuffer {
    fn default() -> Self {
        PooledBuffer {
            bytes: Vec::new(),
            class_ceiling: Self::DEFAULT_CEILING,
        }
    }
}

impl Poolable for PooledBuffer {
    fn reset(&mut self) {
        self.bytes.clear();
    }

    fn is_oversized(&self) -> bool {
        self.bytes.capacity() > self.class_ceiling
    }
}

/// A reusable header-field list (the "one growable header-list buffer" the
/// HPACK decoder and the HTTP/1.1 response parser both reuse across calls,
/// spec §4.3/§4.11).
#[derive(Default)]
pub struct PooledHeaderList {
    pub headers: Vec<crate::hpack::HeaderField>,
}

impl Poolable for PooledHeaderList {
    fn reset(&mut self) {
        self.headers.clear();
    }

    fn is_oversized(&self) -> bool {
        self.headers.capacity() > 512
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(u32);

    impl Poolable for Counter {
        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn acquire_reuses_released_object() {
        let pool: ObjectPool<Counter> = ObjectPool::new(4);
        {
            let mut guard = pool.acquire();
            guard.0 = 42;
        }
        assert_eq!(pool.idle_len(), 1);
        let guard = pool.acquire();
        assert_eq!(guard.0, 0, "released object must be reset");
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn oversized_buffer_is_dropped_not_recycled() {
        let pool: ObjectPool<PooledBuffer> = ObjectPool::new(4);
        {
            let mut guard = pool.acquire();
            guard.bytes.reserve(PooledBuffer::DEFAULT_CEILING + 1);
        }
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn free_list_respects_max_free_ceiling() {
        let pool: ObjectPool<Counter> = ObjectPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_len(), 1);
    }
}
