//! Segmentation overlays drawn on top of the slide.
//!
//! Two kinds of decoration share this module:
//!
//! - [`PolygonOverlay`]: per-cell vector outlines with spatial indexing,
//!   level-of-detail rendering and per-class batching.
//! - [`TissueMapOverlay`]: per-tile class-id rasters colored through a
//!   lookup table and cached as textures.
//!
//! Both own their geometry in flat arenas and index it with `u32` ids
//! (see [`index`]); nothing here holds references across frames.

mod index;
mod polygon;
mod tissue;
mod triangulate;

pub use index::{PolygonIndex, UniformGrid, DEFAULT_GRID_SIZE};
pub use polygon::{LodThresholds, Polygon, PolygonOverlay};
pub use tissue::{TissueClass, TissueMapOverlay, TissueTile};
pub use triangulate::triangulate;
