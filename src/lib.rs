//! PathView - an interactive viewer core for gigapixel whole-slide images
//!
//! This library provides the rendering pipeline of a whole-slide pathology
//! viewer: a pan/zoom viewport over a multi-resolution pyramid, a tile
//! engine with byte-capped caching and progressive fallback, slide sources
//! for local pyramid files and remote tile servers, and segmentation
//! overlays (per-cell polygons and tissue-class rasters).
//!
//! The OS window, GPU surface and event loop belong to the embedding
//! application; the core reaches them through the [`render::Renderer`]
//! seam and is driven one frame at a time.

pub mod config;
pub mod error;
pub mod geom;
pub mod loader;
pub mod minimap;
pub mod navigation;
pub mod overlay;
pub mod remote;
pub mod render;
pub mod slide;
pub mod snapshot;
pub mod tile;
pub mod viewport;

// Re-export commonly used types
pub use config::Config;
pub use error::{ClientError, LoadError, SourceError};
pub use geom::{Rect, Vec2};
pub use loader::{load_segmentation, load_segmentation_file, SegmentationData};
pub use minimap::Minimap;
pub use navigation::NavigationLock;
pub use overlay::{Polygon, PolygonIndex, PolygonOverlay, TissueClass, TissueMapOverlay, TissueTile};
pub use remote::{HttpTransport, ReqwestTransport, SlideEntry, SlideInfo, UrlSigner, WsiStreamClient};
pub use render::{BlendMode, Color, Renderer, ScreenRect, TextureCache, TextureHandle, Vertex};
pub use slide::{LevelDimensions, LocalSlideSource, PyramidReader, RemoteSlideSource, SlideSource};
pub use snapshot::{Snapshot, SnapshotCache};
pub use tile::{
    CacheStats, TileCache, TileData, TileEngine, TileKey, DEFAULT_TILE_CACHE_CAPACITY, TILE_SIZE,
};
pub use viewport::{AnimationMode, Viewport};
