//! Client for the WSI streaming server.
//!
//! The server exposes a small REST surface:
//!
//! - `GET /health` -> `{ "status": "healthy", "version": "..." }`
//! - `GET /slides?limit=N` -> slide listing
//! - `GET /slides/{id}` -> slide metadata (dimensions, levels)
//! - `GET /tiles/{id}/{level}/{x}/{y}.jpg?quality=Q` -> JPEG tile bytes
//!
//! The wire shapes vary between server generations, so parsing is
//! deliberately tolerant: the slide list may be a bare JSON array or wrapped
//! in `{ "slides": [...] }`, entries may be id strings or objects, and
//! missing level metadata falls back to a 256px tile size and power-of-two
//! downsamples.
//!
//! All requests go through the [`HttpTransport`] seam; production uses
//! [`ReqwestTransport`], tests substitute canned responses.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ClientError;

use super::signer::{percent_encode, UrlSigner, DEFAULT_VALIDITY_SECS};

/// JPEG quality requested for tiles when the caller does not specify one.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Connection establishment budget.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read budget for the cheap health probe.
const HEALTH_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Read budget for listing, metadata and tile bodies.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Transport Seam
// =============================================================================

/// Raw HTTP response: status code plus body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Minimal HTTP capability the client needs.
///
/// Implementations perform a GET and hand back whatever the server said;
/// status interpretation stays in the client. Errors are transport-level
/// only (connect failure, timeout, broken stream).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, read_timeout: Duration) -> Result<HttpResponse, ClientError>;
}

/// Production transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, read_timeout: Duration) -> Result<HttpResponse, ClientError> {
        let response = self
            .client
            .get(url)
            .timeout(read_timeout)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// One slide in the server's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideEntry {
    pub id: String,
    /// Display name; falls back to the id
    pub name: String,
    /// File size in bytes, 0 when the server does not report it
    pub size: i64,
}

/// Cached metadata of one remote slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideInfo {
    pub id: String,
    pub width: i64,
    pub height: i64,
    pub level_count: i32,
    /// The server's tile edge length, not necessarily the engine's
    pub tile_size: i32,
    /// Per-level downsample factors, `level_count` entries
    pub downsamples: Vec<f64>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    version: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlideListResponse {
    Entries(Vec<SlideListItem>),
    Wrapped { slides: Vec<SlideListItem> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlideListItem {
    Id(String),
    Entry {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        size: Option<i64>,
    },
}

#[derive(Deserialize)]
struct SlideInfoResponse {
    width: i64,
    height: i64,
    level_count: i32,
    #[serde(default)]
    levels: Vec<LevelEntry>,
}

#[derive(Deserialize)]
struct LevelEntry {
    #[serde(default)]
    tile_width: Option<i32>,
    #[serde(default)]
    downsample: Option<f64>,
}

// =============================================================================
// WsiStreamClient
// =============================================================================

/// Typed client over a WSI streaming server.
///
/// `connect` must succeed before any other call; failed health checks and
/// explicit `disconnect` flip the client back to disconnected and every
/// API call then fails fast with [`ClientError::NotConnected`].
pub struct WsiStreamClient {
    /// Server origin without trailing slash
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    signer: UrlSigner,
    connected: AtomicBool,
}

impl WsiStreamClient {
    /// Build a client for `server_url`. An empty `auth_secret` disables
    /// request signing.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        server_url: &str,
        auth_secret: &str,
    ) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            transport,
            signer: UrlSigner::new(auth_secret),
            connected: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Probe `/health` and, on success, mark the client connected.
    /// Returns the server version string (possibly empty).
    pub async fn connect(&self) -> Result<String, ClientError> {
        let response = self.get("/health", &BTreeMap::new(), HEALTH_READ_TIMEOUT).await;
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let health: HealthResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::InvalidResponse(format!("health body: {e}")))?;

        if health.status != "healthy" {
            self.connected.store(false, Ordering::Release);
            return Err(ClientError::InvalidResponse(format!(
                "server reports status {:?}",
                health.status
            )));
        }

        self.connected.store(true, Ordering::Release);
        info!(url = %self.base_url, version = %health.version, "connected to stream server");
        Ok(health.version)
    }

    /// Drop the connected state. Purely local; the server holds nothing.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        info!(url = %self.base_url, "disconnected from stream server");
    }

    /// Re-probe `/health` without touching error state elsewhere.
    pub async fn check_health(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        matches!(
            self.get("/health", &BTreeMap::new(), HEALTH_READ_TIMEOUT).await,
            Ok(_)
        )
    }

    /// List slides available on the server.
    pub async fn fetch_slide_list(&self, limit: i32) -> Result<Vec<SlideEntry>, ClientError> {
        self.require_connected()?;

        let mut params = BTreeMap::new();
        params.insert("limit".to_string(), limit.to_string());
        let response = self.get("/slides", &params, READ_TIMEOUT).await?;

        let listing: SlideListResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::InvalidResponse(format!("slide list: {e}")))?;
        let items = match listing {
            SlideListResponse::Entries(items) => items,
            SlideListResponse::Wrapped { slides } => slides,
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let entry = match item {
                SlideListItem::Id(id) => SlideEntry {
                    name: id.clone(),
                    id,
                    size: 0,
                },
                SlideListItem::Entry { id, name, size } => SlideEntry {
                    name: name.unwrap_or_else(|| id.clone()),
                    id,
                    size: size.unwrap_or(0),
                },
            };
            if !entry.id.is_empty() {
                entries.push(entry);
            }
        }

        debug!(count = entries.len(), "fetched slide list");
        Ok(entries)
    }

    /// Fetch metadata for one slide.
    pub async fn fetch_slide_info(&self, slide_id: &str) -> Result<SlideInfo, ClientError> {
        self.require_connected()?;

        let path = format!("/slides/{}", percent_encode(slide_id));
        let response = self.get(&path, &BTreeMap::new(), READ_TIMEOUT).await;
        let response = match response {
            Err(ClientError::NotFound(_)) => {
                return Err(ClientError::NotFound(format!("slide {slide_id}")))
            }
            other => other?,
        };

        let body: SlideInfoResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::InvalidResponse(format!("slide info: {e}")))?;

        // Tile size comes from the first level that reports one.
        let tile_size = body
            .levels
            .iter()
            .find_map(|level| level.tile_width)
            .filter(|&size| size > 0)
            .unwrap_or(256);

        // Downsamples fall back to the standard 2x-per-level pyramid.
        let mut downsamples: Vec<f64> = body
            .levels
            .iter()
            .filter_map(|level| level.downsample)
            .collect();
        if downsamples.is_empty() {
            downsamples = (0..body.level_count).map(|l| 2f64.powi(l)).collect();
        }

        let info = SlideInfo {
            id: slide_id.to_string(),
            width: body.width,
            height: body.height,
            level_count: body.level_count,
            tile_size,
            downsamples,
        };
        info!(
            slide = slide_id,
            width = info.width,
            height = info.height,
            levels = info.level_count,
            tile_size = info.tile_size,
            "fetched slide info"
        );
        Ok(info)
    }

    /// Fetch one JPEG tile.
    pub async fn fetch_tile(
        &self,
        slide_id: &str,
        level: i32,
        x: i32,
        y: i32,
        quality: u8,
    ) -> Result<Bytes, ClientError> {
        self.require_connected()?;

        let path = format!(
            "/tiles/{}/{level}/{x}/{y}.jpg",
            percent_encode(slide_id)
        );
        let mut params = BTreeMap::new();
        params.insert("quality".to_string(), quality.to_string());

        let response = self.get(&path, &params, READ_TIMEOUT).await?;
        Ok(response.body)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_connected(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Perform a GET for `path`, signing the query when a secret is
    /// configured, and map non-2xx statuses to typed errors.
    async fn get(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        read_timeout: Duration,
    ) -> Result<HttpResponse, ClientError> {
        let query = self.signer.sign(path, params, DEFAULT_VALIDITY_SECS);
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let response = self.transport.get(&url, read_timeout).await?;
        match response.status {
            200..=299 => Ok(response),
            401 => {
                warn!(path, "authentication failed");
                Err(ClientError::AuthDenied)
            }
            404 => Err(ClientError::NotFound(path.to_string())),
            status => Err(ClientError::Status(status)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
