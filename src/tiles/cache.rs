use super::id::TileId;
use super::stacked::StackedTile;
use lru::LruCache;
use std::sync::{Arc, Mutex};

/// Hit/miss counters and occupancy of the volatile cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub bytes: usize,
}

struct CacheState {
    entries: LruCache<TileId, Arc<StackedTile>>,
    current_bytes: usize,
    limit_bytes: usize,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn evict_to_fit(&mut self) {
        // the most recently inserted tile is the last candidate
        while self.current_bytes > self.limit_bytes {
            match self.entries.pop_lru() {
                Some((id, tile)) => {
                    self.current_bytes -= tile.byte_count();
                    log::debug!("evicted {} ({} bytes)", id, tile.byte_count());
                }
                None => break,
            }
        }
    }
}

/// In-memory cache of stacked tiles with a byte budget and LRU eviction.
///
/// The total byte count of cached tiles never exceeds the limit after an
/// insert or a limit change returns.
pub struct VolatileCache {
    state: Mutex<CacheState>,
}

impl VolatileCache {
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                current_bytes: 0,
                limit_bytes,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Get a tile and mark it as most recently used
    pub fn get(&self, id: &TileId) -> Option<Arc<StackedTile>> {
        let mut state = self.state.lock().ok()?;
        match state.entries.get(id).cloned() {
            Some(tile) => {
                state.hits += 1;
                Some(tile)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Get a tile without touching recency or statistics
    pub fn peek(&self, id: &TileId) -> Option<Arc<StackedTile>> {
        self.state.lock().ok()?.entries.peek(id).cloned()
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains(id))
            .unwrap_or(false)
    }

    /// Insert or replace a tile, then evict least recently used tiles until the
    /// budget holds again
    pub fn insert(&self, tile: Arc<StackedTile>) {
        if let Ok(mut state) = self.state.lock() {
            let size = tile.byte_count();
            if let Some(old) = state.entries.put(tile.id(), tile) {
                state.current_bytes -= old.byte_count();
            }
            state.current_bytes += size;
            state.evict_to_fit();
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.current_bytes = 0;
        }
    }

    pub fn limit_bytes(&self) -> usize {
        self.state.lock().map(|state| state.limit_bytes).unwrap_or(0)
    }

    /// Change the budget; shrinking evicts immediately
    pub fn set_limit_bytes(&self, limit_bytes: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.limit_bytes = limit_bytes;
            state.evict_to_fit();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_count(&self) -> usize {
        self.state.lock().map(|state| state.current_bytes).unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        self.state
            .lock()
            .map(|state| CacheStats {
                hits: state.hits,
                misses: state.misses,
                entries: state.entries.len(),
                bytes: state.current_bytes,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn tile(x: u32, size: u32) -> Arc<StackedTile> {
        Arc::new(StackedTile::new(TileId::new(1, 2, x, 0), RgbaImage::new(size, size)))
    }

    #[test]
    fn test_tile_cache_basic_operations() {
        let cache = VolatileCache::new(1 << 20);
        assert!(cache.is_empty());

        cache.insert(tile(0, 8));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.byte_count(), 8 * 8 * 4);
        assert!(cache.contains(&TileId::new(1, 2, 0, 0)));
        assert!(cache.get(&TileId::new(1, 2, 0, 0)).is_some());
        assert!(cache.get(&TileId::new(1, 2, 9, 0)).is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.byte_count(), 0);
    }

    #[test]
    fn test_replacing_a_tile_keeps_byte_count_exact() {
        let cache = VolatileCache::new(1 << 20);
        cache.insert(tile(0, 8));
        cache.insert(tile(0, 4));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.byte_count(), 4 * 4 * 4);
    }

    #[test]
    fn test_lru_eviction_by_bytes() {
        // room for exactly three 8x8 tiles
        let cache = VolatileCache::new(3 * 256);
        cache.insert(tile(0, 8));
        cache.insert(tile(1, 8));
        cache.insert(tile(2, 8));

        // touch tile 0 so tile 1 becomes the least recently used
        assert!(cache.get(&TileId::new(1, 2, 0, 0)).is_some());
        cache.insert(tile(3, 8));

        assert_eq!(cache.len(), 3);
        assert!(cache.byte_count() <= cache.limit_bytes());
        assert!(cache.contains(&TileId::new(1, 2, 0, 0)));
        assert!(!cache.contains(&TileId::new(1, 2, 1, 0)));
        assert!(cache.contains(&TileId::new(1, 2, 3, 0)));
    }

    #[test]
    fn test_shrinking_limit_evicts_immediately() {
        let cache = VolatileCache::new(1 << 20);
        for x in 0..10 {
            cache.insert(tile(x, 8));
        }
        cache.set_limit_bytes(2 * 256);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&TileId::new(1, 2, 9, 0)));
        assert!(cache.contains(&TileId::new(1, 2, 8, 0)));
    }

    #[test]
    fn test_oversized_tile_never_breaks_budget() {
        let cache = VolatileCache::new(100);
        cache.insert(tile(0, 8));
        assert!(cache.byte_count() <= 100);
        assert!(cache.is_empty());
    }
}
