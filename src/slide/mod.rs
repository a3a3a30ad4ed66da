//! Slide abstraction layer.
//!
//! This module provides a unified interface for reading pixel regions from
//! a whole-slide pyramid regardless of where it lives.
//!
//! # Architecture
//!
//! The slide abstraction sits between the tile engine and the concrete
//! pixel suppliers:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Engine                │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           SlideSource Trait             │
//! │   (pyramid queries + region reads)      │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ LocalSlideSource│    │  RemoteSlideSource  │
//! │ (pyramid file)  │    │  (WSI tile server)  │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod local;
mod remote;

pub use local::{LocalSlideSource, PyramidReader};
pub use remote::RemoteSlideSource;

use async_trait::async_trait;

use crate::tile::TileData;

// =============================================================================
// Level Information
// =============================================================================

/// Pixel dimensions of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelDimensions {
    pub width: i64,
    pub height: i64,
}

impl LevelDimensions {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

// =============================================================================
// SlideSource Trait
// =============================================================================

/// Capability set shared by every slide supplier.
///
/// Levels are indexed from 0 (full resolution) upward; `level_downsample`
/// is monotone non-decreasing with `downsample(0) = 1.0`. Out-of-range
/// level queries degrade to `(0, 0)` dimensions and downsample `1.0`
/// rather than failing, so callers probe levels freely.
///
/// `read_region` coordinates follow the pyramid-library convention: `x`
/// and `y` are level-0 coordinates, `width` and `height` are in the
/// requested level's space. A failed read returns `None` and leaves the
/// failure message in `last_error`; the tile engine keeps showing its
/// fallback for that slot.
#[async_trait]
pub trait SlideSource: Send + Sync {
    /// Whether the source is usable. A source can become invalid after
    /// construction (e.g. a reader error mid-session).
    fn is_valid(&self) -> bool;

    /// Human-readable description of the most recent failure.
    fn last_error(&self) -> String;

    fn level_count(&self) -> i32;

    /// Dimensions of a level, `(0, 0)` when out of range.
    fn level_dimensions(&self, level: i32) -> LevelDimensions;

    /// Downsample factor of a level, `1.0` when out of range.
    fn level_downsample(&self, level: i32) -> f64;

    /// Level-0 width.
    fn width(&self) -> i64;

    /// Level-0 height.
    fn height(&self) -> i64;

    /// Path for local slides, server URL + id for remote ones.
    fn identifier(&self) -> String;

    fn is_remote(&self) -> bool;

    /// Read a `width x height` region at `level`, with `x, y` in level-0
    /// coordinates. Returns RGBA pixels or `None` on failure.
    async fn read_region(
        &self,
        level: i32,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> Option<TileData>;
}
