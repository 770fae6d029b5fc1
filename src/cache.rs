//! Response cache for search results
//!
//! Search responses are cached as serialized JSON bytes so a hit returns a
//! byte-identical payload. Entries expire after their TTL; any write to the
//! listings clears the whole cache and bumps its generation, so a search that
//! started before the write cannot store its now-stale result.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A cached search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Serialized JSON body
    pub body: Vec<u8>,
    /// TTL the entry was stored with (drives `Cache-Control: max-age`)
    pub ttl: Duration,
}

/// Key-value cache for serialized responses
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedResponse>;

    /// Current generation, advanced by every `invalidate_all`
    fn generation(&self) -> u64;

    /// Store `value` only if no invalidation happened since `generation` was
    /// read. Returns whether the entry was stored.
    fn set_at(&self, key: String, value: CachedResponse, ttl: Duration, generation: u64) -> bool;

    fn set(&self, key: String, value: CachedResponse, ttl: Duration) {
        self.set_at(key, value, ttl, self.generation());
    }

    /// Drop every entry and advance the generation
    fn invalidate_all(&self);

    /// Live entries (expired entries may still be counted until evicted)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    value: CachedResponse,
    expires_at: Instant,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<String, Entry>,
    generation: u64,
}

/// In-process TTL cache bounded by entry count
pub struct MemoryCache {
    slots: Mutex<Slots>,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // A panic while holding the lock leaves the map consistent
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut slots = self.lock();
        let entries = &mut slots.entries;
        let now = Instant::now();

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                log::debug!("Response cache HIT: {}", key);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            log::debug!("Response cache EXPIRED: {}", key);
            entries.remove(key);
        } else {
            log::debug!("Response cache MISS: {}", key);
        }
        None
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn set_at(&self, key: String, value: CachedResponse, ttl: Duration, generation: u64) -> bool {
        let mut slots = self.lock();
        if slots.generation != generation {
            log::debug!("Response cache invalidated during search, not storing {}", key);
            return false;
        }

        let entries = &mut slots.entries;
        let now = Instant::now();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.expires_at > now);

            if entries.len() >= self.capacity {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(soonest) = soonest {
                    log::debug!("Response cache full, evicting {}", soonest);
                    entries.remove(&soonest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        true
    }

    fn invalidate_all(&self) {
        let mut slots = self.lock();
        if !slots.entries.is_empty() {
            log::info!("Invalidating {} cached responses", slots.entries.len());
        }
        slots.entries.clear();
        slots.generation = slots.generation.wrapping_add(1);
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
