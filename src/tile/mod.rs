//! Tile pipeline: identity, pixels, caching and the per-frame engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Render Loop                │
//! └────────────────────┬────────────────────┘
//!                      │ render(viewport, …)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Engine                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  fetch workers  │  │
//! │  │  (byte-capped│  │  (bounded, de-  │  │
//! │  │   LRU)       │  │   duplicated)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ read_region
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             SlideSource                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileKey`]: `(level, x, y)` identity used everywhere a tile is named
//! - [`TileData`]: an owned RGBA pixel block
//! - [`TileCache`]: byte-capped LRU with hit/miss statistics
//! - [`TileEngine`]: level selection, enumeration, async fetch, fallback

mod cache;
mod data;
mod engine;
mod key;

pub use cache::{CacheStats, TileCache, DEFAULT_TILE_CACHE_CAPACITY};
pub use data::TileData;
pub use engine::{TileEngine, DEFAULT_FETCH_WORKERS, TEXTURE_PRUNE_INTERVAL};
pub use key::TileKey;

/// Edge length of the engine's tiles, in slide pixels at the drawn level.
pub const TILE_SIZE: i32 = 512;
