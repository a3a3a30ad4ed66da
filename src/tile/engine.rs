//! Tile engine: turns a viewport into tile draws.
//!
//! Per frame the engine selects the pyramid level closest to the current
//! zoom, enumerates the tiles covering the visible region, and draws the
//! best pixels it has for each slot:
//!
//! 1. the exact tile, when cached;
//! 2. otherwise the covering sub-region of the nearest coarser cached
//!    ancestor (progressive fallback);
//! 3. otherwise nothing; the background shows through for a frame or two.
//!
//! Missing tiles are handed to a bounded pool of fetch tasks. The render
//! thread never waits: completions come back over a channel and are folded
//! into the cache at the start of the next frame. The in-flight set keeps
//! at most one fetch per key outstanding, so zoom churn cannot flood the
//! source with duplicates.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::geom::Vec2;
use crate::render::{Renderer, ScreenRect, TextureCache};
use crate::slide::SlideSource;
use crate::viewport::Viewport;

use super::{CacheStats, TileCache, TileData, TileKey, DEFAULT_TILE_CACHE_CAPACITY, TILE_SIZE};

/// Fetch tasks allowed to run concurrently.
pub const DEFAULT_FETCH_WORKERS: usize = 4;

/// Frames between texture-cache prunes against the tile cache.
pub const TEXTURE_PRUNE_INTERVAL: u64 = 60;

/// Outcome of one background fetch. `data` is `None` when the source
/// failed; the slot keeps its fallback and may be re-requested next frame.
struct FetchResult {
    key: TileKey,
    data: Option<TileData>,
}

// =============================================================================
// TileEngine
// =============================================================================

/// Level selection, visible-tile enumeration, async fetching and
/// progressive-fallback drawing over one [`SlideSource`].
pub struct TileEngine {
    source: Arc<dyn SlideSource>,
    cache: TileCache,

    runtime: Handle,
    fetch_slots: Arc<Semaphore>,
    in_flight: HashSet<TileKey>,
    completion_tx: UnboundedSender<FetchResult>,
    completion_rx: UnboundedReceiver<FetchResult>,

    frame_counter: u64,
}

impl TileEngine {
    pub fn new(source: Arc<dyn SlideSource>, runtime: Handle) -> Self {
        Self::with_config(
            source,
            runtime,
            DEFAULT_FETCH_WORKERS,
            DEFAULT_TILE_CACHE_CAPACITY,
        )
    }

    pub fn with_config(
        source: Arc<dyn SlideSource>,
        runtime: Handle,
        fetch_workers: usize,
        cache_capacity: usize,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            source,
            cache: TileCache::with_capacity(cache_capacity),
            runtime,
            fetch_slots: Arc::new(Semaphore::new(fetch_workers.max(1))),
            in_flight: HashSet::new(),
            completion_tx,
            completion_rx,
            frame_counter: 0,
        }
    }

    // =========================================================================
    // Level selection & enumeration
    // =========================================================================

    /// Pick the level whose downsample is closest to `1 / zoom`. Ties go
    /// to the higher-resolution level so the image never looks softer than
    /// it must.
    pub fn select_level(&self, zoom: f64) -> i32 {
        let target = 1.0 / zoom;
        let mut best_level = 0;
        let mut best_downsample = self.source.level_downsample(0);
        let mut best_diff = (best_downsample - target).abs();

        for level in 1..self.source.level_count() {
            let downsample = self.source.level_downsample(level);
            let diff = (downsample - target).abs();
            if diff < best_diff || (diff == best_diff && downsample < best_downsample) {
                best_level = level;
                best_downsample = downsample;
                best_diff = diff;
            }
        }
        best_level
    }

    /// Keys of every tile at `level` intersecting the visible region.
    pub fn visible_tiles(&self, viewport: &Viewport, level: i32) -> Vec<TileKey> {
        let region = viewport.visible_region();
        let downsample = self.source.level_downsample(level);
        let dims = self.source.level_dimensions(level);
        if dims.width <= 0 || dims.height <= 0 {
            return Vec::new();
        }

        let level_left = ((region.x / downsample).floor() as i64).clamp(0, dims.width);
        let level_top = ((region.y / downsample).floor() as i64).clamp(0, dims.height);
        let level_right =
            (((region.x + region.width) / downsample) as i64).clamp(0, dims.width);
        let level_bottom =
            (((region.y + region.height) / downsample) as i64).clamp(0, dims.height);

        let tile_size = TILE_SIZE as i64;
        let start_x = (level_left / tile_size) as i32;
        let start_y = (level_top / tile_size) as i32;
        let end_x = (level_right / tile_size) as i32;
        let end_y = (level_bottom / tile_size) as i32;

        let mut tiles = Vec::new();
        for tile_y in start_y..=end_y {
            for tile_x in start_x..=end_x {
                tiles.push(TileKey::new(level, tile_x, tile_y));
            }
        }
        tiles
    }

    // =========================================================================
    // Frame rendering
    // =========================================================================

    /// Draw one frame of slide pixels.
    pub fn render(
        &mut self,
        viewport: &Viewport,
        renderer: &mut dyn Renderer,
        textures: &mut TextureCache,
    ) {
        self.pump_completions();

        if !self.source.is_valid() {
            return;
        }

        let level = self.select_level(viewport.zoom());
        for key in self.visible_tiles(viewport, level) {
            self.draw_tile(key, viewport, renderer, textures);
        }

        self.frame_counter += 1;
        if self.frame_counter % TEXTURE_PRUNE_INTERVAL == 0 {
            textures.prune(&self.cache, renderer);
        }
    }

    /// Fold finished fetches into the cache. Called at the top of `render`;
    /// callers driving the engine manually (tests, prefetchers) call it
    /// directly.
    pub fn pump_completions(&mut self) {
        while let Ok(result) = self.completion_rx.try_recv() {
            self.in_flight.remove(&result.key);
            match result.data {
                Some(data) => self.cache.insert(result.key, data),
                None => debug!(key = %result.key, "fetch retired without data"),
            }
        }
    }

    fn draw_tile(
        &mut self,
        key: TileKey,
        viewport: &Viewport,
        renderer: &mut dyn Renderer,
        textures: &mut TextureCache,
    ) {
        let downsample = self.source.level_downsample(key.level);

        // Exact hit.
        if let Some(data) = self.cache.get(&key) {
            let dst = tile_screen_rect(viewport, &key, data.width(), data.height(), downsample);
            if let Some(texture) = textures.get_or_create(key, data, renderer) {
                renderer.draw_texture(texture, None, dst);
            }
            return;
        }

        // Progressive fallback from the closest coarser cached ancestor.
        self.draw_fallback(key, downsample, viewport, renderer, textures);
        self.request_tile(key, downsample);
    }

    fn draw_fallback(
        &mut self,
        key: TileKey,
        downsample: f64,
        viewport: &Viewport,
        renderer: &mut dyn Renderer,
        textures: &mut TextureCache,
    ) {
        let dims = self.source.level_dimensions(key.level);
        let tile_size = TILE_SIZE as i64;
        let tile_width = tile_size.min(dims.width - key.tile_x as i64 * tile_size);
        let tile_height = tile_size.min(dims.height - key.tile_y as i64 * tile_size);
        if tile_width <= 0 || tile_height <= 0 {
            return;
        }

        for ancestor_level in (key.level + 1)..self.source.level_count() {
            let ancestor_downsample = self.source.level_downsample(ancestor_level);
            let scale = downsample / ancestor_downsample;
            let ancestor_key = TileKey::new(
                ancestor_level,
                (key.tile_x as f64 * scale).floor() as i32,
                (key.tile_y as f64 * scale).floor() as i32,
            );

            if !self.cache.has(&ancestor_key) {
                continue;
            }
            let Some(ancestor) = self.cache.get(&ancestor_key) else {
                continue;
            };

            // Target tile extent inside the ancestor, in ancestor texels.
            let ancestor_origin_x = ancestor_key.tile_x as f64 * TILE_SIZE as f64;
            let ancestor_origin_y = ancestor_key.tile_y as f64 * TILE_SIZE as f64;
            let src_x = key.tile_x as f64 * TILE_SIZE as f64 * scale - ancestor_origin_x;
            let src_y = key.tile_y as f64 * TILE_SIZE as f64 * scale - ancestor_origin_y;
            let src_w = tile_width as f64 * scale;
            let src_h = tile_height as f64 * scale;

            let src = ScreenRect::new(
                (src_x.floor() as i32).clamp(0, ancestor.width()),
                (src_y.floor() as i32).clamp(0, ancestor.height()),
                (src_w.ceil() as i32).clamp(1, ancestor.width()),
                (src_h.ceil() as i32).clamp(1, ancestor.height()),
            );
            let dst = tile_screen_rect(
                viewport,
                &key,
                tile_width as i32,
                tile_height as i32,
                downsample,
            );

            if let Some(texture) = textures.get_or_create(ancestor_key, ancestor, renderer) {
                renderer.draw_texture(texture, Some(src), dst);
            }
            return;
        }
    }

    /// Queue a background fetch for `key` unless one is already in flight.
    fn request_tile(&mut self, key: TileKey, downsample: f64) {
        if self.in_flight.contains(&key) || self.cache.has(&key) {
            return;
        }

        let dims = self.source.level_dimensions(key.level);
        let tile_size = TILE_SIZE as i64;
        let level_x = key.tile_x as i64 * tile_size;
        let level_y = key.tile_y as i64 * tile_size;
        let width = tile_size.min(dims.width - level_x);
        let height = tile_size.min(dims.height - level_y);
        if width <= 0 || height <= 0 {
            return;
        }

        // read_region takes its origin in level-0 coordinates.
        let x0 = (level_x as f64 * downsample) as i64;
        let y0 = (level_y as f64 * downsample) as i64;

        self.in_flight.insert(key);
        let source = self.source.clone();
        let slots = self.fetch_slots.clone();
        let completion_tx = self.completion_tx.clone();

        self.runtime.spawn(async move {
            let Ok(_permit) = slots.acquire().await else {
                return;
            };
            let data = source.read_region(key.level, x0, y0, width, height).await;
            if data.is_none() {
                warn!(key = %key, error = %source.last_error(), "tile read failed");
            }
            // Receiver gone means the engine was dropped; nothing to do.
            let _ = completion_tx.send(FetchResult { key, data });
        });
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of fetches currently outstanding.
    pub fn pending_fetches(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop all cached tiles (statistics survive).
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Screen rectangle of a tile, floor/ceil rounded so adjacent tiles share
/// edges without gaps.
fn tile_screen_rect(
    viewport: &Viewport,
    key: &TileKey,
    width: i32,
    height: i32,
    downsample: f64,
) -> ScreenRect {
    let x0 = key.tile_x as f64 * TILE_SIZE as f64 * downsample;
    let y0 = key.tile_y as f64 * TILE_SIZE as f64 * downsample;
    let x1 = x0 + width as f64 * downsample;
    let y1 = y0 + height as f64 * downsample;

    let top_left = viewport.slide_to_screen(Vec2::new(x0, y0));
    let bottom_right = viewport.slide_to_screen(Vec2::new(x1, y1));

    let x = top_left.x.floor();
    let y = top_left.y.floor();
    ScreenRect::new(
        x as i32,
        y as i32,
        (bottom_right.x - x).ceil() as i32,
        (bottom_right.y - y).ceil() as i32,
    )
}

// =============================================================================
// Tests
// =============================================================================
