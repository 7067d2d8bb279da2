use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Default entry time-to-live
const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default total byte budget (20 MiB)
const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Cache key: connection identity plus remote path
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub profile_id: u64,
    pub path: String,
}

impl CacheKey {
    pub fn new(profile_id: u64, path: impl Into<String>) -> Self {
        Self {
            profile_id,
            path: path.into(),
        }
    }
}

struct Entry {
    data: Arc<Vec<u8>>,
    size: u64,
    inserted_at: Instant,
}

struct State {
    entries: HashMap<CacheKey, Entry>,
    total_bytes: u64,
    ttl: Duration,
    max_bytes: u64,
}

/// In-memory byte cache with two independent eviction policies: TTL expiry
/// checked lazily on read, and oldest-insertion-first eviction applied
/// eagerly on write to keep the total resident size within budget.
///
/// Entries are never mutated in place; a fresh `put` replaces the entry and
/// resets its timestamp. A payload larger than the whole budget is rejected
/// up front rather than left resident alone over budget.
#[derive(Clone)]
pub struct ByteCache {
    state: Arc<Mutex<State>>,
}

impl Default for ByteCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_BYTES)
    }
}

impl ByteCache {
    pub fn new(ttl: Duration, max_bytes: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                total_bytes: 0,
                ttl,
                max_bytes,
            })),
        }
    }

    /// Swap the limits; the next operation picks them up
    pub fn configure(&self, ttl: Duration, max_bytes: u64) {
        let mut state = self.state.lock();
        state.ttl = ttl;
        state.max_bytes = max_bytes;
    }

    /// Fetch a payload if present and fresh; an expired entry is removed
    /// and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        let mut state = self.state.lock();
        let fresh = match state.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() <= state.ttl,
            None => return None,
        };
        if !fresh {
            if let Some(stale) = state.entries.remove(key) {
                state.total_bytes -= stale.size;
                trace!(?key, "expired cache entry dropped on read");
            }
            return None;
        }
        state.entries.get(key).map(|e| Arc::clone(&e.data))
    }

    /// Insert or replace a payload with a fresh timestamp, then evict
    /// oldest entries until the byte budget is satisfied.
    ///
    /// The `Arc` is stored as-is, so the caller keeps sharing the same
    /// allocation with the cache.
    pub fn put(&self, key: CacheKey, data: Arc<Vec<u8>>) {
        let size = data.len() as u64;
        let mut state = self.state.lock();

        if size > state.max_bytes {
            debug!(?key, size, budget = state.max_bytes, "payload exceeds cache budget, not cached");
            return;
        }

        if let Some(old) = state.entries.remove(&key) {
            state.total_bytes -= old.size;
        }
        state.total_bytes += size;
        state.entries.insert(
            key,
            Entry {
                data,
                size,
                inserted_at: Instant::now(),
            },
        );

        while state.total_bytes > state.max_bytes {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    if let Some(evicted) = state.entries.remove(&k) {
                        state.total_bytes -= evicted.size;
                        debug!(key = ?k, size = evicted.size, "evicted cache entry over byte budget");
                    }
                }
                None => break,
            }
        }
    }

    /// Total resident payload bytes
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().total_bytes
    }

    /// Number of resident entries (expired entries may still count until
    /// touched)
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }
}
