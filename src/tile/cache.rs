//! In-memory cache for decoded tiles.
//!
//! This module provides a byte-capped LRU cache of RGBA tiles, keyed by
//! [`TileKey`]. It is the working set behind the tile engine: the render
//! loop reads from it every frame and fetch workers feed it through the
//! engine's completion channel.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of resident tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. A single tile
//! larger than the whole budget still becomes resident (after evicting
//! everything else): showing *something* beats a strict memory guarantee.
//!
//! # Statistics
//!
//! Hit/miss counters drive the viewer's HUD. They are cumulative for the
//! cache's lifetime and deliberately survive [`TileCache::clear`].

use lru::LruCache;
use tracing::debug;

use super::{TileData, TileKey};

/// Default capacity: 256MB, roughly 256 full 512x512 RGBA tiles.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of `get` calls that found their tile
    pub hits: u64,

    /// Number of `get` calls that did not
    pub misses: u64,

    /// Resident tiles
    pub tile_count: usize,

    /// Total bytes of resident pixel data
    pub memory_usage: usize,

    /// Byte capacity
    pub max_memory: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when no lookups have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Byte-capped LRU cache of `TileKey -> TileData`.
///
/// The cache is owned by the render thread and accessed through `&mut self`;
/// fetch workers never touch it directly (they hand completed tiles to the
/// engine, which inserts them while pumping its completion channel).
pub struct TileCache {
    /// Recency-ordered entries; capacity is enforced in bytes, not entries
    entries: LruCache<TileKey, TileData>,

    /// Maximum total size in bytes
    max_memory: usize,

    /// Current total size in bytes
    memory_usage: usize,

    hits: u64,
    misses: u64,
}

impl TileCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache bounded to `max_memory` bytes of pixel data.
    pub fn with_capacity(max_memory: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_memory,
            memory_usage: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a tile, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: &TileKey) -> Option<&TileData> {
        if !self.entries.contains(key) {
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        self.entries.get(key)
    }

    /// Check residency without touching recency order or statistics.
    pub fn has(&self, key: &TileKey) -> bool {
        self.entries.contains(key)
    }

    /// Insert a tile, evicting from the LRU end until the byte budget holds.
    ///
    /// If the key is already resident the new data is dropped and the
    /// existing entry wins; fetch producers can race on a key and the first
    /// arrival is as good as any. The entry just inserted is never evicted,
    /// even when it alone exceeds the budget.
    pub fn insert(&mut self, key: TileKey, data: TileData) {
        if self.entries.contains(&key) {
            debug!(%key, "duplicate tile insert ignored");
            return;
        }

        self.memory_usage += data.byte_size();
        self.entries.put(key, data);

        while self.memory_usage > self.max_memory && self.entries.len() > 1 {
            if let Some((evicted_key, evicted)) = self.entries.pop_lru() {
                self.memory_usage -= evicted.byte_size();
                debug!(key = %evicted_key, bytes = evicted.byte_size(), "evicted tile");
            }
        }
    }

    /// Drop every tile. Hit/miss counters are preserved.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_usage = 0;
    }

    pub fn tile_count(&self) -> usize {
        self.entries.len()
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            tile_count: self.entries.len(),
            memory_usage: self.memory_usage,
            max_memory: self.max_memory,
        }
    }

    /// Iterate resident keys, most recent first. Used by the texture cache
    /// to prune GPU textures down to the CPU working set.
    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.entries.iter().map(|(key, _)| key)
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
