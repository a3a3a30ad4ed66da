//! Segmentation file loader.
//!
//! Slide segmentation ships as a protobuf `SlideSegmentationData` record:
//! per-tile cell masks (polygon outlines in tile-local coordinates) plus
//! optional tissue-class rasters. Two schema generations are in the wild:
//!
//! - **v1**: masks carry their cell type as a string; tissue rasters are
//!   raw or zlib-deflated (`0x78` leading byte).
//! - **v2**: cell types are indices into a `cell_class_names` table, and
//!   tiles may instead carry zstd-compressed `cells_blob` /
//!   `tissue_blob` payloads with a fixed little-endian layout.
//!
//! Files do not announce their version. Detection is trial-parse: the v2
//! and v1 decodes disagree on wire types for the mask fields, so exactly
//! one of them yields a usable tile list.
//!
//! Coordinates in masks are tile-local at the tile's deep-zoom level;
//! loading lifts them to level-0 slide space via
//! `(p + tile_origin * tile_size) * 2^(max_level - level)`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use prost::Message;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::geom::Vec2;
use crate::overlay::{Polygon, TissueTile};
use crate::render::Color;

use super::palette::{cell_color, fallback_color};

// =============================================================================
// Wire Messages
// =============================================================================

/// Protobuf message definitions for both schema generations.
pub mod pb {
    /// Original schema: cell types inline as strings.
    pub mod v1 {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct SlideSegmentationData {
            #[prost(string, tag = "1")]
            pub slide_id: ::prost::alloc::string::String,
            #[prost(uint32, tag = "2")]
            pub max_level: u32,
            #[prost(message, repeated, tag = "3")]
            pub tiles: ::prost::alloc::vec::Vec<Tile>,
            #[prost(map = "int32, string", tag = "4")]
            pub tissue_class_mapping: ::std::collections::HashMap<i32, ::prost::alloc::string::String>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Tile {
            #[prost(uint32, tag = "1")]
            pub level: u32,
            #[prost(uint32, tag = "2")]
            pub x: u32,
            #[prost(uint32, tag = "3")]
            pub y: u32,
            #[prost(uint32, tag = "4")]
            pub width: u32,
            #[prost(uint32, tag = "5")]
            pub height: u32,
            #[prost(message, repeated, tag = "6")]
            pub masks: ::prost::alloc::vec::Vec<Mask>,
            #[prost(message, optional, tag = "7")]
            pub tissue_segmentation_map: ::core::option::Option<TissueSegmentationMap>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Mask {
            #[prost(string, tag = "1")]
            pub cell_type: ::prost::alloc::string::String,
            #[prost(message, repeated, tag = "2")]
            pub coordinates: ::prost::alloc::vec::Vec<Point>,
        }

        #[derive(Clone, Copy, PartialEq, ::prost::Message)]
        pub struct Point {
            #[prost(float, tag = "1")]
            pub x: f32,
            #[prost(float, tag = "2")]
            pub y: f32,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct TissueSegmentationMap {
            #[prost(int32, tag = "1")]
            pub width: i32,
            #[prost(int32, tag = "2")]
            pub height: i32,
            #[prost(bytes = "vec", tag = "3")]
            pub data: ::prost::alloc::vec::Vec<u8>,
        }
    }

    /// Second-generation schema: cell types by table index, optional
    /// zstd blobs replacing the repeated message fields.
    pub mod v2 {
        pub use super::v1::{Point, TissueSegmentationMap};

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct SlideSegmentationData {
            #[prost(string, tag = "1")]
            pub slide_id: ::prost::alloc::string::String,
            #[prost(uint32, tag = "2")]
            pub max_level: u32,
            #[prost(message, repeated, tag = "3")]
            pub tiles: ::prost::alloc::vec::Vec<Tile>,
            #[prost(map = "int32, string", tag = "4")]
            pub tissue_class_mapping: ::std::collections::HashMap<i32, ::prost::alloc::string::String>,
            #[prost(string, repeated, tag = "5")]
            pub cell_class_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Tile {
            #[prost(uint32, tag = "1")]
            pub level: u32,
            #[prost(uint32, tag = "2")]
            pub x: u32,
            #[prost(uint32, tag = "3")]
            pub y: u32,
            #[prost(uint32, tag = "4")]
            pub width: u32,
            #[prost(uint32, tag = "5")]
            pub height: u32,
            #[prost(message, repeated, tag = "6")]
            pub masks: ::prost::alloc::vec::Vec<Mask>,
            #[prost(message, optional, tag = "7")]
            pub tissue_segmentation_map: ::core::option::Option<TissueSegmentationMap>,
            #[prost(bytes = "vec", optional, tag = "8")]
            pub cells_blob: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
            #[prost(bytes = "vec", optional, tag = "9")]
            pub tissue_blob: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Mask {
            #[prost(uint32, tag = "1")]
            pub cell_class_index: u32,
            #[prost(message, repeated, tag = "2")]
            pub coordinates: ::prost::alloc::vec::Vec<Point>,
        }
    }
}

// =============================================================================
// Loaded Data
// =============================================================================

/// Everything a segmentation file contributes to the overlays.
pub struct SegmentationData {
    pub slide_id: String,
    pub max_level: i32,
    pub polygons: Vec<Polygon>,
    pub class_colors: BTreeMap<i32, Color>,
    pub class_names: BTreeMap<i32, String>,
    pub tissue_tiles: Vec<TissueTile>,
    pub tissue_class_mapping: BTreeMap<i32, String>,
}

/// Load a segmentation file from disk.
pub fn load_segmentation_file(path: impl AsRef<Path>) -> Result<SegmentationData, LoadError> {
    let bytes = std::fs::read(path.as_ref())?;
    load_segmentation(&bytes)
}

/// Decode a segmentation payload, auto-detecting the schema version.
pub fn load_segmentation(bytes: &[u8]) -> Result<SegmentationData, LoadError> {
    let v2 = pb::v2::SlideSegmentationData::decode(bytes);
    if let Ok(ref data) = v2 {
        if !data.tiles.is_empty() {
            debug!("segmentation schema detected: v2");
            return load_v2(data.clone());
        }
    }

    let v1 = pb::v1::SlideSegmentationData::decode(bytes);
    if let Ok(ref data) = v1 {
        if !data.tiles.is_empty() {
            debug!("segmentation schema detected: v1");
            return load_v1(data.clone());
        }
    }

    // Neither parse produced tiles: accept an empty-but-valid file, reject
    // everything else.
    match (v2, v1) {
        (Ok(data), _) => load_v2(data),
        (_, Ok(data)) => load_v1(data),
        (Err(_), Err(_)) => Err(LoadError::UnknownSchema),
    }
}

// =============================================================================
// v1 Loading
// =============================================================================

fn load_v1(data: pb::v1::SlideSegmentationData) -> Result<SegmentationData, LoadError> {
    let max_level = data.max_level as i32;

    // Class ids are assigned by sorted cell-type name, so a reload of the
    // same file maps names to the same ids.
    let unique_types: BTreeSet<&str> = data
        .tiles
        .iter()
        .flat_map(|tile| tile.masks.iter().map(|mask| mask.cell_type.as_str()))
        .collect();
    let (class_ids_by_name, class_colors, class_names) = build_class_tables(&unique_types);

    let mut polygons = Vec::new();
    let mut tissue_tiles = Vec::new();

    for tile in &data.tiles {
        let scale = 2f64.powi(max_level - tile.level as i32);

        for mask in &tile.masks {
            if mask.coordinates.len() < 3 {
                continue;
            }
            let class_id = class_ids_by_name[mask.cell_type.as_str()];
            polygons.push(lift_polygon(class_id, &mask.coordinates, tile.x, tile.y, tile.width, tile.height, scale));
        }

        if let Some(raster) = &tile.tissue_segmentation_map {
            match load_tissue_raster(tile, raster) {
                Ok(tissue_tile) => tissue_tiles.push(tissue_tile),
                Err(e) => {
                    warn!(
                        tile_x = tile.x,
                        tile_y = tile.y,
                        "skipping tissue raster: {e}"
                    );
                }
            }
        }
    }

    info!(
        slide = %data.slide_id,
        polygons = polygons.len(),
        classes = class_names.len(),
        tissue_tiles = tissue_tiles.len(),
        "loaded segmentation (v1)"
    );

    Ok(SegmentationData {
        slide_id: data.slide_id,
        max_level,
        polygons,
        class_colors,
        class_names,
        tissue_tiles,
        tissue_class_mapping: data.tissue_class_mapping.into_iter().collect(),
    })
}

// =============================================================================
// v2 Loading
// =============================================================================

fn load_v2(data: pb::v2::SlideSegmentationData) -> Result<SegmentationData, LoadError> {
    let max_level = data.max_level as i32;

    let type_name = |index: u32| -> String {
        data.cell_class_names
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| format!("type {index}"))
    };

    // Collect the names actually used, from blobs and inline masks alike.
    let mut used_types: BTreeSet<String> = BTreeSet::new();
    let mut decoded_blobs: Vec<Option<Vec<BlobMask>>> = Vec::with_capacity(data.tiles.len());
    for tile in &data.tiles {
        let blob_masks = match &tile.cells_blob {
            Some(blob) => match decode_cells_blob(blob) {
                Ok(masks) => Some(masks),
                Err(e) => {
                    warn!(tile_x = tile.x, tile_y = tile.y, "skipping cells blob: {e}");
                    Some(Vec::new())
                }
            },
            None => None,
        };
        match &blob_masks {
            Some(masks) => {
                for mask in masks {
                    used_types.insert(type_name(mask.class_index));
                }
            }
            None => {
                for mask in &tile.masks {
                    used_types.insert(type_name(mask.cell_class_index));
                }
            }
        }
        decoded_blobs.push(blob_masks);
    }

    let borrowed: BTreeSet<&str> = used_types.iter().map(String::as_str).collect();
    let (class_ids_by_name, class_colors, class_names) = build_class_tables(&borrowed);

    let mut polygons = Vec::new();
    let mut tissue_tiles = Vec::new();

    for (tile, blob_masks) in data.tiles.iter().zip(decoded_blobs) {
        let scale = 2f64.powi(max_level - tile.level as i32);

        match blob_masks {
            Some(masks) => {
                for mask in masks {
                    if mask.points.len() < 3 {
                        continue;
                    }
                    let class_id = class_ids_by_name[type_name(mask.class_index).as_str()];
                    polygons.push(lift_blob_polygon(class_id, &mask.points, tile.x, tile.y, tile.width, tile.height, scale));
                }
            }
            None => {
                for mask in &tile.masks {
                    if mask.coordinates.len() < 3 {
                        continue;
                    }
                    let class_id = class_ids_by_name[type_name(mask.cell_class_index).as_str()];
                    polygons.push(lift_polygon(class_id, &mask.coordinates, tile.x, tile.y, tile.width, tile.height, scale));
                }
            }
        }

        // Tissue: the blob wins over the embedded raster when both exist.
        if let Some(blob) = &tile.tissue_blob {
            match decode_tissue_blob(blob, tile.width as usize, tile.height as usize) {
                Ok(class_data) => tissue_tiles.push(TissueTile::new(
                    tile.level as i32,
                    tile.x as i32,
                    tile.y as i32,
                    tile.width as i32,
                    tile.height as i32,
                    class_data,
                )),
                Err(e) => {
                    warn!(tile_x = tile.x, tile_y = tile.y, "skipping tissue blob: {e}");
                }
            }
        } else if let Some(raster) = &tile.tissue_segmentation_map {
            match load_tissue_raster_v2(tile, raster) {
                Ok(tissue_tile) => tissue_tiles.push(tissue_tile),
                Err(e) => {
                    warn!(
                        tile_x = tile.x,
                        tile_y = tile.y,
                        "skipping tissue raster: {e}"
                    );
                }
            }
        }
    }

    info!(
        slide = %data.slide_id,
        polygons = polygons.len(),
        classes = class_names.len(),
        tissue_tiles = tissue_tiles.len(),
        "loaded segmentation (v2)"
    );

    Ok(SegmentationData {
        slide_id: data.slide_id,
        max_level,
        polygons,
        class_colors,
        class_names,
        tissue_tiles,
        tissue_class_mapping: data.tissue_class_mapping.into_iter().collect(),
    })
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Assign ids 0..n to the sorted type names and pick a color for each:
/// built-in when the name is recognized, fallback palette otherwise.
fn build_class_tables(
    unique_types: &BTreeSet<&str>,
) -> (
    BTreeMap<String, i32>,
    BTreeMap<i32, Color>,
    BTreeMap<i32, String>,
) {
    let mut ids_by_name = BTreeMap::new();
    let mut colors = BTreeMap::new();
    let mut names = BTreeMap::new();

    let mut fallback_index = 0;
    for (class_id, &name) in unique_types.iter().enumerate() {
        let class_id = class_id as i32;
        let color = cell_color(name).unwrap_or_else(|| {
            let color = fallback_color(fallback_index);
            fallback_index += 1;
            color
        });

        ids_by_name.insert(name.to_string(), class_id);
        colors.insert(class_id, color);
        names.insert(class_id, name.to_string());
    }
    (ids_by_name, colors, names)
}

fn lift_polygon(
    class_id: i32,
    coordinates: &[pb::v1::Point],
    tile_x: u32,
    tile_y: u32,
    tile_width: u32,
    tile_height: u32,
    scale: f64,
) -> Polygon {
    let vertices = coordinates
        .iter()
        .map(|p| {
            Vec2::new(
                (p.x as f64 + tile_x as f64 * tile_width as f64) * scale,
                (p.y as f64 + tile_y as f64 * tile_height as f64) * scale,
            )
        })
        .collect();
    Polygon::new(class_id, vertices)
}

fn lift_blob_polygon(
    class_id: i32,
    points: &[(f32, f32)],
    tile_x: u32,
    tile_y: u32,
    tile_width: u32,
    tile_height: u32,
    scale: f64,
) -> Polygon {
    let vertices = points
        .iter()
        .map(|&(x, y)| {
            Vec2::new(
                (x as f64 + tile_x as f64 * tile_width as f64) * scale,
                (y as f64 + tile_y as f64 * tile_height as f64) * scale,
            )
        })
        .collect();
    Polygon::new(class_id, vertices)
}

fn load_tissue_raster(
    tile: &pb::v1::Tile,
    raster: &pb::v1::TissueSegmentationMap,
) -> Result<TissueTile, LoadError> {
    let expected = raster.width as usize * raster.height as usize;
    let class_data = inflate_raster(&raster.data, expected)?;
    Ok(TissueTile::new(
        tile.level as i32,
        tile.x as i32,
        tile.y as i32,
        raster.width,
        raster.height,
        class_data,
    ))
}

fn load_tissue_raster_v2(
    tile: &pb::v2::Tile,
    raster: &pb::v1::TissueSegmentationMap,
) -> Result<TissueTile, LoadError> {
    let expected = raster.width as usize * raster.height as usize;
    let class_data = inflate_raster(&raster.data, expected)?;
    Ok(TissueTile::new(
        tile.level as i32,
        tile.x as i32,
        tile.y as i32,
        raster.width,
        raster.height,
        class_data,
    ))
}

/// Tissue rasters are zlib streams when the first byte is `0x78`, raw
/// class bytes otherwise.
fn inflate_raster(data: &[u8], expected: usize) -> Result<Vec<u8>, LoadError> {
    let class_data = if data.first() == Some(&0x78) {
        let mut inflated = Vec::with_capacity(expected);
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut inflated)
            .map_err(|e| LoadError::Decompress(format!("zlib: {e}")))?;
        inflated
    } else {
        data.to_vec()
    };

    if class_data.len() != expected {
        return Err(LoadError::MalformedBlob(format!(
            "raster is {} bytes, expected {expected}",
            class_data.len()
        )));
    }
    Ok(class_data)
}

// =============================================================================
// v2 Blob Layouts
// =============================================================================

struct BlobMask {
    class_index: u32,
    points: Vec<(f32, f32)>,
}

/// Layout after zstd: `u32 mask_count`, then per mask `u16 class_index`,
/// `u32 point_count`, `point_count * (f32 x, f32 y)`. Little-endian.
fn decode_cells_blob(blob: &[u8]) -> Result<Vec<BlobMask>, LoadError> {
    let raw = zstd::stream::decode_all(blob)
        .map_err(|e| LoadError::Decompress(format!("zstd: {e}")))?;
    let mut cursor = BlobCursor::new(&raw);

    let mask_count = cursor.read_u32()?;
    let mut masks = Vec::new();
    for _ in 0..mask_count {
        let class_index = cursor.read_u16()? as u32;
        let point_count = cursor.read_u32()?;
        // Reject before allocating for a count a corrupt blob cannot back.
        if point_count as usize * 8 > cursor.remaining() {
            return Err(LoadError::MalformedBlob(format!(
                "mask claims {point_count} points with {} bytes left",
                cursor.remaining()
            )));
        }
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            let x = cursor.read_f32()?;
            let y = cursor.read_f32()?;
            points.push((x, y));
        }
        masks.push(BlobMask {
            class_index,
            points,
        });
    }

    if !cursor.is_at_end() {
        return Err(LoadError::MalformedBlob(format!(
            "{} trailing bytes after {mask_count} masks",
            cursor.remaining()
        )));
    }
    Ok(masks)
}

/// Layout after zstd: exactly `width * height` class bytes, row-major.
fn decode_tissue_blob(blob: &[u8], width: usize, height: usize) -> Result<Vec<u8>, LoadError> {
    let raw = zstd::stream::decode_all(blob)
        .map_err(|e| LoadError::Decompress(format!("zstd: {e}")))?;
    if raw.len() != width * height {
        return Err(LoadError::MalformedBlob(format!(
            "tissue blob is {} bytes, expected {}",
            raw.len(),
            width * height
        )));
    }
    Ok(raw)
}

/// Bounds-checked little-endian reader over a decoded blob.
struct BlobCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BlobCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        if self.offset + n > self.data.len() {
            return Err(LoadError::MalformedBlob(format!(
                "truncated at byte {}",
                self.offset
            )));
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32, LoadError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn is_at_end(&self) -> bool {
        self.offset == self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

// =============================================================================
// Tests
// =============================================================================
