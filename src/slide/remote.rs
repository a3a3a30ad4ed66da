//! Remote slide source over the WSI stream client.
//!
//! The engine asks for 512px tiles in its own grid; the server serves JPEG
//! tiles of whatever edge length it was built with (commonly 256). Each
//! `read_region` therefore fetches the covering range of server tiles,
//! decodes them, and composites the pixels into the requested buffer with
//! clipping at slide edges. Server tiles that fail to arrive leave their
//! pixels zeroed, so a partially failed read still renders.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageReader;
use tracing::{error, warn};

use crate::error::{ClientError, SourceError};
use crate::remote::{SlideInfo, WsiStreamClient, DEFAULT_JPEG_QUALITY};
use crate::tile::TileData;

use super::{LevelDimensions, SlideSource};

/// Transport attempts per server tile. Decode failures are not retried:
/// a corrupt body will be corrupt again.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Decoded server tile: RGBA pixels plus actual dimensions (edge tiles run
/// smaller than the nominal tile size).
struct DecodedTile {
    width: i64,
    height: i64,
    pixels: Vec<u8>,
}

// =============================================================================
// RemoteSlideSource
// =============================================================================

/// A slide served over HTTP, exposed through the [`SlideSource`] contract.
pub struct RemoteSlideSource {
    client: Arc<WsiStreamClient>,
    slide_id: String,
    /// Metadata fetched once at open time
    info: SlideInfo,
    quality: u8,
    last_error: Mutex<String>,
    /// Serializes fetching; the HTTP client is not assumed reentrant
    fetch_lock: tokio::sync::Mutex<()>,
}

impl RemoteSlideSource {
    /// Open a slide on an already-connected client. Fetches and caches the
    /// slide metadata.
    pub async fn open(
        client: Arc<WsiStreamClient>,
        slide_id: &str,
    ) -> Result<Self, SourceError> {
        if !client.is_connected() {
            return Err(SourceError::State("client not connected".to_string()));
        }

        let info = client.fetch_slide_info(slide_id).await?;
        Ok(Self {
            client,
            slide_id: slide_id.to_string(),
            info,
            quality: DEFAULT_JPEG_QUALITY,
            last_error: Mutex::new(String::new()),
            fetch_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Tile edge length used by the server (not the engine).
    pub fn server_tile_size(&self) -> i32 {
        self.info.tile_size
    }

    pub fn slide_id(&self) -> &str {
        &self.slide_id
    }

    /// JPEG quality requested for tiles.
    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.clamp(1, 100);
    }

    fn record_error(&self, message: String) {
        *self.last_error.lock().unwrap() = message;
    }

    /// Fetch and decode one server tile, retrying transient transport
    /// failures.
    async fn fetch_and_decode(&self, level: i32, tile_x: i32, tile_y: i32) -> Option<DecodedTile> {
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            match self
                .client
                .fetch_tile(&self.slide_id, level, tile_x, tile_y, self.quality)
                .await
            {
                Ok(body) => {
                    return match decode_jpeg_rgba(&body) {
                        Ok(tile) => Some(tile),
                        Err(message) => {
                            error!(
                                slide = %self.slide_id,
                                level,
                                tile_x,
                                tile_y,
                                "JPEG decode failed: {message}"
                            );
                            self.record_error(message);
                            None
                        }
                    };
                }
                // Missing and unauthorized tiles will not appear on retry.
                Err(e @ (ClientError::NotFound(_) | ClientError::AuthDenied)) => {
                    self.record_error(e.to_string());
                    return None;
                }
                Err(e) => {
                    if attempt < MAX_FETCH_ATTEMPTS {
                        warn!(
                            slide = %self.slide_id,
                            level,
                            tile_x,
                            tile_y,
                            attempt,
                            "tile fetch failed, retrying: {e}"
                        );
                    } else {
                        error!(
                            slide = %self.slide_id,
                            level,
                            tile_x,
                            tile_y,
                            "tile fetch failed after {MAX_FETCH_ATTEMPTS} attempts: {e}"
                        );
                        self.record_error(e.to_string());
                    }
                }
            }
        }
        None
    }
}

/// Decode a JPEG body into RGBA8 pixels.
fn decode_jpeg_rgba(body: &Bytes) -> Result<DecodedTile, String> {
    let reader = ImageReader::with_format(Cursor::new(body.as_ref()), image::ImageFormat::Jpeg);
    let decoded = reader.decode().map_err(|e| e.to_string())?;
    let rgba = decoded.to_rgba8();
    Ok(DecodedTile {
        width: rgba.width() as i64,
        height: rgba.height() as i64,
        pixels: rgba.into_raw(),
    })
}

#[async_trait]
impl SlideSource for RemoteSlideSource {
    fn is_valid(&self) -> bool {
        self.client.is_connected()
    }

    fn last_error(&self) -> String {
        self.last_error.lock().unwrap().clone()
    }

    fn level_count(&self) -> i32 {
        self.info.level_count
    }

    fn level_dimensions(&self, level: i32) -> LevelDimensions {
        if level < 0 || level >= self.info.level_count {
            return LevelDimensions::default();
        }
        let downsample = self.level_downsample(level);
        LevelDimensions::new(
            (self.info.width as f64 / downsample) as i64,
            (self.info.height as f64 / downsample) as i64,
        )
    }

    fn level_downsample(&self, level: i32) -> f64 {
        self.info
            .downsamples
            .get(level as usize)
            .copied()
            .unwrap_or(1.0)
    }

    fn width(&self) -> i64 {
        self.info.width
    }

    fn height(&self) -> i64 {
        self.info.height
    }

    fn identifier(&self) -> String {
        format!("{}/{}", self.client.base_url(), self.slide_id)
    }

    fn is_remote(&self) -> bool {
        true
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
            self.record_error("client not connected".to_string());
            return None;
        }
        if width <= 0 || height <= 0 {
            return None;
        }

        let _guard = self.fetch_lock.lock().await;

        let downsample = self.level_downsample(level);
        let server_tile = self.info.tile_size as i64;

        // The request arrives with x, y in level-0 coordinates and the
        // extent already in level space.
        let level_x = (x as f64 / downsample) as i64;
        let level_y = (y as f64 / downsample) as i64;

        let start_tile_x = level_x / server_tile;
        let start_tile_y = level_y / server_tile;
        let end_tile_x = (level_x + width - 1) / server_tile;
        let end_tile_y = (level_y + height - 1) / server_tile;

        let mut output = vec![0u8; (width * height * 4) as usize];

        for tile_y in start_tile_y..=end_tile_y {
            for tile_x in start_tile_x..=end_tile_x {
                let Some(tile) = self
                    .fetch_and_decode(level, tile_x as i32, tile_y as i32)
                    .await
                else {
                    // Failed tiles stay zeroed in the output.
                    continue;
                };

                let tile_origin_x = tile_x * server_tile;
                let tile_origin_y = tile_y * server_tile;

                // Overlap of the tile (at its actual decoded size) with the
                // requested region, in level coordinates.
                let copy_x0 = level_x.max(tile_origin_x);
                let copy_y0 = level_y.max(tile_origin_y);
                let copy_x1 = (level_x + width).min(tile_origin_x + tile.width);
                let copy_y1 = (level_y + height).min(tile_origin_y + tile.height);
                if copy_x0 >= copy_x1 || copy_y0 >= copy_y1 {
                    continue;
                }

                let src_x = copy_x0 - tile_origin_x;
                let dst_x = copy_x0 - level_x;
                let row_bytes = ((copy_x1 - copy_x0) * 4) as usize;

                for row in copy_y0..copy_y1 {
                    let src_offset = (((row - tile_origin_y) * tile.width + src_x) * 4) as usize;
                    let dst_offset = (((row - level_y) * width + dst_x) * 4) as usize;
                    output[dst_offset..dst_offset + row_bytes]
                        .copy_from_slice(&tile.pixels[src_offset..src_offset + row_bytes]);
                }
            }
        }

        Some(TileData::new(width as i32, height as i32, output))
    }
}
