//! TTL-bounded snapshot of the board read-model

use corkboard_core::model::Board;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    board: Arc<Board>,
    stored_at: Instant,
}

struct CacheState {
    entry: Option<Entry>,
    generation: u64,
}

/// Single global board snapshot, keyed by freshness only
///
/// Every invalidation bumps a generation counter. A reader takes the
/// generation before computing a board and may only store it if nothing
/// invalidated the cache in between, so a board computed before a mutation
/// can never be cached after it.
pub struct SnapshotCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entry: None,
                generation: 0,
            }),
        }
    }

    /// Fresh snapshot, if any
    pub fn get(&self) -> Option<Arc<Board>> {
        let mut state = self.state.lock();
        let fresh = state
            .entry
            .as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.board));
        if fresh.is_none() {
            state.entry = None;
        }
        fresh
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Store a snapshot computed at `generation`; returns whether it was kept
    pub fn put(&self, board: Arc<Board>, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.entry = Some(Entry {
            board,
            stored_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entry = None;
        state.generation += 1;
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SnapshotCache")
            .field("ttl", &self.ttl)
            .field("cached", &state.entry.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn board() -> Arc<Board> {
        Arc::new(Board {
            columns: Vec::new(),
            computed_at: Utc::now(),
        })
    }

    #[test]
    fn test_put_then_get() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let generation = cache.generation();
        let stored = board();
        assert!(cache.put(Arc::clone(&stored), generation));
        assert!(Arc::ptr_eq(&cache.get().unwrap(), &stored));
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = SnapshotCache::new(Duration::ZERO);
        cache.put(board(), cache.generation());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_clears_entry() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.put(board(), cache.generation());
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_stale_generation_rejected() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let generation = cache.generation();
        cache.invalidate();
        assert!(!cache.put(board(), generation));
        assert!(cache.get().is_none());
    }
}
