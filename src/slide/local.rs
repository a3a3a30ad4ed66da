//! Local slide source backed by a pyramid-reader library.
//!
//! The pyramid library itself (OpenSlide or equivalent) is an external
//! collaborator behind the [`PyramidReader`] trait. Readers hand back
//! pre-multiplied ARGB words; this adapter repacks them into the
//! byte-order RGBA the rest of the pipeline expects and caches the level
//! geometry so per-frame queries never touch the library.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::tile::TileData;

use super::{LevelDimensions, SlideSource};

// =============================================================================
// PyramidReader Trait
// =============================================================================

/// Seam to the pyramid-reading library.
///
/// `read_region_argb` returns one `u32` per pixel holding pre-multiplied
/// ARGB (alpha in the highest byte), the native output of the common
/// pyramid readers. `x, y` are level-0 coordinates; `width, height` are in
/// the requested level's space.
pub trait PyramidReader: Send + Sync {
    fn level_count(&self) -> i32;

    fn level_dimensions(&self, level: i32) -> LevelDimensions;

    fn level_downsample(&self, level: i32) -> f64;

    fn read_region_argb(
        &self,
        level: i32,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> Result<Vec<u32>, String>;
}

// =============================================================================
// LocalSlideSource
// =============================================================================

/// Adapter from a [`PyramidReader`] to the [`SlideSource`] contract.
pub struct LocalSlideSource<R: PyramidReader> {
    reader: R,
    path: String,

    /// Geometry cached at open time; probing levels is free afterwards
    level_dimensions: Vec<LevelDimensions>,
    level_downsamples: Vec<f64>,

    valid: AtomicBool,
    last_error: Mutex<String>,
}

impl<R: PyramidReader> LocalSlideSource<R> {
    /// Open a slide over an already-constructed reader.
    pub fn open(reader: R, path: impl Into<String>) -> Self {
        let path = path.into();
        let level_count = reader.level_count();

        let mut level_dimensions = Vec::with_capacity(level_count as usize);
        let mut level_downsamples = Vec::with_capacity(level_count as usize);
        for level in 0..level_count {
            let dims = reader.level_dimensions(level);
            let downsample = reader.level_downsample(level);
            debug!(
                level,
                width = dims.width,
                height = dims.height,
                downsample,
                "pyramid level"
            );
            level_dimensions.push(dims);
            level_downsamples.push(downsample);
        }

        info!(path = %path, levels = level_count, "opened local slide");

        Self {
            reader,
            path,
            level_dimensions,
            level_downsamples,
            valid: AtomicBool::new(level_count > 0),
            last_error: Mutex::new(String::new()),
        }
    }

    fn fail(&self, message: String) {
        error!(path = %self.path, "{message}");
        *self.last_error.lock().unwrap() = message;
        self.valid.store(false, Ordering::Release);
    }
}

/// Repack pre-multiplied ARGB words into byte-order `R, G, B, A`.
fn argb_words_to_rgba_bytes(words: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for &argb in words {
        let a = (argb >> 24) as u8;
        let r = (argb >> 16) as u8;
        let g = (argb >> 8) as u8;
        let b = argb as u8;
        bytes.extend_from_slice(&[r, g, b, a]);
    }
    bytes
}

#[async_trait]
impl<R: PyramidReader> SlideSource for LocalSlideSource<R> {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn last_error(&self) -> String {
        self.last_error.lock().unwrap().clone()
    }

    fn level_count(&self) -> i32 {
        self.level_dimensions.len() as i32
    }

    fn level_dimensions(&self, level: i32) -> LevelDimensions {
        self.level_dimensions
            .get(level as usize)
            .copied()
            .unwrap_or_default()
    }

    fn level_downsample(&self, level: i32) -> f64 {
        self.level_downsamples
            .get(level as usize)
            .copied()
            .unwrap_or(1.0)
    }

    fn width(&self) -> i64 {
        self.level_dimensions.first().map_or(0, |d| d.width)
    }

    fn height(&self) -> i64 {
        self.level_dimensions.first().map_or(0, |d| d.height)
    }

    fn identifier(&self) -> String {
        self.path.clone()
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn read_region(
        &self,
        level: i32,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> Option<TileData> {
        if !self.is_valid() {
            return None;
        }
        if level < 0 || level >= self.level_count() {
            // Out-of-range probe, not a reader fault; the source stays valid.
            *self.last_error.lock().unwrap() = format!("invalid level {level}");
            return None;
        }
        if width <= 0 || height <= 0 {
            return None;
        }

        match self.reader.read_region_argb(level, x, y, width, height) {
            Ok(words) => {
                if words.len() != (width * height) as usize {
                    self.fail(format!(
                        "reader returned {} pixels for a {width}x{height} region",
                        words.len()
                    ));
                    return None;
                }
                Some(TileData::new(
                    width as i32,
                    height as i32,
                    argb_words_to_rgba_bytes(&words),
                ))
            }
            Err(message) => {
                self.fail(message);
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
