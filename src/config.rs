//! Configuration for an embedding application.
//!
//! The viewer core is a library; the application shell parses this once
//! at startup and wires the pieces together. Supports:
//! - Command-line arguments via clap
//! - Environment variables with `PATHVIEW_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `PATHVIEW_SERVER_URL` - WSI stream server to connect to
//! - `PATHVIEW_AUTH_SECRET` - HMAC secret for signed tile requests
//! - `PATHVIEW_CACHE_MB` - Tile cache budget in megabytes (default: 256)
//! - `PATHVIEW_FETCH_WORKERS` - Concurrent tile fetches (default: 4)
//! - `PATHVIEW_JPEG_QUALITY` - Quality requested from the server (default: 80)
//! - `PATHVIEW_OVERLAY_OPACITY` - Initial overlay opacity (default: 0.5)

use clap::Parser;

use crate::remote::DEFAULT_JPEG_QUALITY;
use crate::tile::DEFAULT_FETCH_WORKERS;

/// Default tile cache budget in megabytes.
pub const DEFAULT_CACHE_MB: usize = 256;

/// Default overlay opacity.
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.5;

/// PathView - interactive viewer for gigapixel whole-slide images.
#[derive(Parser, Debug, Clone)]
#[command(name = "pathview")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Remote Server
    // =========================================================================
    /// WSI stream server URL (e.g. https://tiles.example.org).
    ///
    /// When absent the viewer starts with local slides only.
    #[arg(long, env = "PATHVIEW_SERVER_URL")]
    pub server_url: Option<String>,

    /// Secret key for HMAC-SHA256 signed tile requests.
    ///
    /// Leave unset against servers with authentication disabled.
    #[arg(long, env = "PATHVIEW_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    // =========================================================================
    // Caching & Fetching
    // =========================================================================
    /// Tile cache budget in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB, env = "PATHVIEW_CACHE_MB")]
    pub cache_mb: usize,

    /// Concurrent tile fetch workers.
    #[arg(long, default_value_t = DEFAULT_FETCH_WORKERS, env = "PATHVIEW_FETCH_WORKERS")]
    pub fetch_workers: usize,

    /// JPEG quality requested from the tile server (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PATHVIEW_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // Overlays
    // =========================================================================
    /// Initial opacity for segmentation overlays (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_OVERLAY_OPACITY, env = "PATHVIEW_OVERLAY_OPACITY")]
    pub overlay_opacity: f32,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.server_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("server_url must be http(s): {url}"));
            }
        }

        if self.cache_mb == 0 {
            return Err("cache_mb must be greater than 0".to_string());
        }
        if self.fetch_workers == 0 {
            return Err("fetch_workers must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err("overlay_opacity must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Tile cache budget in bytes.
    pub fn cache_bytes(&self) -> usize {
        self.cache_mb * 1024 * 1024
    }

    /// Auth secret, empty string when unset (signing disabled).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }
}

// =============================================================================
// Tests
// =============================================================================
