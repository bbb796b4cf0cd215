//! Sharded stream map (spec §4.8 "Sharded stream map"): 16 independent
//! shards, each an `RwLock`-guarded `HashMap`, so concurrent streams make
//! genuine progress without a single global lock serializing them (spec §5
//! "the sharded map and per-stream locks permit genuine parallelism").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::h2::stream::Stream;

const SHARD_COUNT: usize = 16;
const SHARD_MASK: u32 = 0xF;

struct Shard {
    streams: RwLock<HashMap<u32, Arc<Stream>>>,
}

/// Stream map partitioned by `id & 0xF` into 16 shards.
pub struct ShardedStreamMap {
    shards: [Shard; SHARD_COUNT],
}

impl Default for ShardedStreamMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedStreamMap {
    pub fn new() -> Self {
        ShardedStreamMap {
            shards: std::array::from_fn(|_| Shard {
                streams: RwLock::new(HashMap::new()),
            }),
        }
    }

    #[inline]
    fn shard_for(&self, id: u32) -> &Shard {
        &self.shards[(id & SHARD_MASK) as usize]
    }

    pub fn get(&self, id: u32) -> Option<Arc<Stream>> {
        self.shard_for(id).streams.read().get(&id).cloned()
    }

    pub fn set(&self, id: u32, stream: Arc<Stream>) {
        self.shard_for(id).streams.write().insert(id, stream);
    }

    pub fn delete(&self, id: u32) -> Option<Arc<Stream>> {
        self.shard_for(id).streams.write().remove(&id)
    }

    /// Sum of all shards' lengths (spec testable property #7: equals the
    /// count `forEach` would visit).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.streams.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates every shard under its own read-lock, stopping early if `f`
    /// returns `false`. Per spec §4.8, the caller must not call mutating map
    /// operations on `self` from inside `f` -- doing so would deadlock on
    /// the shard already held for reading.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Stream>) -> bool,
    {
        for shard in &self.shards {
            let guard = shard.streams.read();
            for stream in guard.values() {
                if !f(stream) {
                    return;
                }
            }
        }
    }

    /// Collects the ids of every stream whose idle duration exceeds
    /// `threshold`, used by the idle watchdog (spec §4.8).
    pub fn ids_idle_longer_than(&self, threshold: std::time::Duration) -> Vec<u32> {
        let mut ids = Vec::new();
        self.for_each(|stream| {
            if stream.idle_for() > threshold {
                ids.push(stream.id);
            }
            true
        });
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::stream::CancelToken;

    fn stream(id: u32) -> Arc<Stream> {
        Arc::new(Stream::new(id, 65_535, 65_535, CancelToken::new()))
    }

    #[test]
    fn routes_by_low_nibble_and_sums_across_shards() {
        let map = ShardedStreamMap::new();
        map.set(1, stream(1));
        map.set(17, stream(17)); // same shard as 1 (1 & 0xF == 17 & 0xF)
        map.set(2, stream(2));

        assert_eq!(map.len(), 3);
        assert!(map.get(1).is_some());
        assert!(map.get(17).is_some());
    }

    #[test]
    fn delete_removes_and_for_each_counts_match_len() {
        let map = ShardedStreamMap::new();
        for id in 1..=20u32 {
            map.set(id, stream(id));
        }
        map.delete(5);
        assert_eq!(map.len(), 19);

        let mut counted = 0;
        map.for_each(|_| {
            counted += 1;
            true
        });
        assert_eq!(counted, map.len());
    }

    #[test]
    fn for_each_can_stop_early() {
        let map = ShardedStreamMap::new();
        for id in 1..=5u32 {
            map.set(id, stream(id));
        }
        let mut visited = 0;
        map.for_each(|_| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
    }
}
