//! Shared fixtures: a synthetic slide source, a recording renderer and a
//! canned HTTP transport.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use pathview::{
    BlendMode, ClientError, Color, HttpTransport, LevelDimensions, Renderer, ScreenRect,
    SlideSource, TextureHandle, TileData, Vertex,
};

// =============================================================================
// Synthetic Slide Source
// =============================================================================

/// Pyramid whose levels each read as a solid color; reads can be failed
/// on demand and are counted.
pub struct MockSlideSource {
    pub width: i64,
    pub height: i64,
    pub downsamples: Vec<f64>,
    /// One fill byte per level (pixels become `[fill, fill, fill, 255]`)
    pub level_fills: Vec<u8>,
    pub fail_levels: Vec<i32>,
    pub reads: AtomicUsize,
}

impl MockSlideSource {
    pub fn new(width: i64, height: i64, downsamples: &[f64]) -> Self {
        Self {
            width,
            height,
            downsamples: downsamples.to_vec(),
            level_fills: (0..downsamples.len()).map(|l| (l * 40 + 40) as u8).collect(),
            fail_levels: Vec::new(),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn failing_level(mut self, level: i32) -> Self {
        self.fail_levels.push(level);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlideSource for MockSlideSource {
    fn is_valid(&self) -> bool {
        true
    }
    fn last_error(&self) -> String {
        String::new()
    }
    fn level_count(&self) -> i32 {
        self.downsamples.len() as i32
    }
    fn level_dimensions(&self, level: i32) -> LevelDimensions {
        match self.downsamples.get(level as usize) {
            Some(d) => LevelDimensions::new(
                (self.width as f64 / d) as i64,
                (self.height as f64 / d) as i64,
            ),
            None => LevelDimensions::default(),
        }
    }
    fn level_downsample(&self, level: i32) -> f64 {
        self.downsamples.get(level as usize).copied().unwrap_or(1.0)
    }
    fn width(&self) -> i64 {
        self.width
    }
    fn height(&self) -> i64 {
        self.height
    }
    fn identifier(&self) -> String {
        "mock://slide".to_string()
    }
    fn is_remote(&self) -> bool {
        false
    }
    async fn read_region(
        &self,
        level: i32,
        _x: i64,
        _y: i64,
        width: i64,
        height: i64,
    ) -> Option<TileData> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_levels.contains(&level) {
            return None;
        }
        let fill = self.level_fills.get(level as usize).copied().unwrap_or(0);
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[fill, fill, fill, 255]);
        }
        Some(TileData::new(width as i32, height as i32, pixels))
    }
}

// =============================================================================
// Recording Renderer
// =============================================================================

/// A recorded textured-quad draw.
#[derive(Debug, Clone, Copy)]
pub struct TextureDraw {
    pub texture: TextureHandle,
    pub src: Option<ScreenRect>,
    pub dst: ScreenRect,
}

/// Renderer that mints handles and records what was drawn.
#[derive(Default)]
pub struct RecordingRenderer {
    next_id: u64,
    pub live_textures: usize,
    pub texture_draws: Vec<TextureDraw>,
    pub points: Vec<(i32, i32)>,
    pub triangle_batches: Vec<(usize, usize)>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact_draws(&self) -> usize {
        self.texture_draws.iter().filter(|d| d.src.is_none()).count()
    }

    pub fn fallback_draws(&self) -> usize {
        self.texture_draws.iter().filter(|d| d.src.is_some()).count()
    }
}

impl Renderer for RecordingRenderer {
    fn create_texture(&mut self, _w: u32, _h: u32, _rgba: &[u8]) -> Option<TextureHandle> {
        self.next_id += 1;
        self.live_textures += 1;
        Some(TextureHandle(self.next_id))
    }
    fn update_texture(&mut self, _t: TextureHandle, _rgba: &[u8]) -> bool {
        true
    }
    fn destroy_texture(&mut self, _t: TextureHandle) {
        self.live_textures -= 1;
    }
    fn set_blend_mode(&mut self, _m: BlendMode) {}
    fn set_texture_alpha(&mut self, _t: TextureHandle, _a: u8) {}
    fn draw_texture(&mut self, texture: TextureHandle, src: Option<ScreenRect>, dst: ScreenRect) {
        self.texture_draws.push(TextureDraw { texture, src, dst });
    }
    fn fill_rect(&mut self, _r: ScreenRect, _c: Color) {}
    fn draw_rect_outline(&mut self, _r: ScreenRect, _c: Color) {}
    fn draw_point(&mut self, x: i32, y: i32, _c: Color) {
        self.points.push((x, y));
    }
    fn draw_triangles(&mut self, vertices: &[Vertex], indices: &[u32]) {
        self.triangle_batches.push((vertices.len(), indices.len()));
    }
}

// =============================================================================
// Canned HTTP Transport
// =============================================================================

/// Encode a solid-color JPEG for tile bodies.
pub fn make_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Bytes {
    let mut image = image::RgbImage::new(width, height);
    for pixel in image.pixels_mut() {
        *pixel = image::Rgb(rgb);
    }
    let mut body = Cursor::new(Vec::new());
    image
        .write_to(&mut body, image::ImageFormat::Jpeg)
        .expect("encode fixture JPEG");
    Bytes::from(body.into_inner())
}

type Responder = Box<dyn Fn(u32) -> Result<(u16, Bytes), ClientError> + Send + Sync>;

/// Transport serving canned responses by path, with per-path attempt
/// counters so tests can script transient failures.
pub struct MockTransport {
    routes: Mutex<HashMap<String, Responder>>,
    attempts: Mutex<HashMap<String, u32>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_health(self) -> Self {
        self.route_ok("/health", Bytes::from_static(br#"{"status":"healthy","version":"test"}"#))
    }

    pub fn route_ok(self, path: &str, body: Bytes) -> Self {
        self.route_fn(path, move |_| Ok((200, body.clone())))
    }

    pub fn route_status(self, path: &str, status: u16) -> Self {
        self.route_fn(path, move |_| Ok((status, Bytes::new())))
    }

    /// Fail with a transport error for the first `failures` attempts, then
    /// serve `body`.
    pub fn route_flaky(self, path: &str, failures: u32, body: Bytes) -> Self {
        self.route_fn(path, move |attempt| {
            if attempt < failures {
                Err(ClientError::Transport("connection reset".to_string()))
            } else {
                Ok((200, body.clone()))
            }
        })
    }

    pub fn route_fn(
        self,
        path: &str,
        responder: impl Fn(u32) -> Result<(u16, Bytes), ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Box::new(responder));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &str,
        _read_timeout: Duration,
    ) -> Result<pathview::remote::HttpResponse, ClientError> {
        self.requests.lock().unwrap().push(url.to_string());

        let path = url
            .strip_prefix("http://server")
            .unwrap_or(url)
            .split('?')
            .next()
            .unwrap()
            .to_string();

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(path.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };

        let routes = self.routes.lock().unwrap();
        match routes.get(&path) {
            Some(responder) => responder(attempt).map(|(status, body)| {
                pathview::remote::HttpResponse { status, body }
            }),
            None => Ok(pathview::remote::HttpResponse {
                status: 404,
                body: Bytes::new(),
            }),
        }
    }
}
