//! Minimap: a corner overview of the whole slide with a viewport indicator.
//!
//! The overview is a single read of the coarsest pyramid level, done once
//! at construction (that level is small enough to hold in one texture).
//! Each frame draws a translucent backdrop, the overview, an outline and
//! the current visible region; clicking jumps the viewport to the clicked
//! slide position.

use tracing::{error, info};

use crate::geom::Vec2;
use crate::render::{BlendMode, Color, Renderer, ScreenRect, TextureHandle};
use crate::slide::SlideSource;
use crate::viewport::{AnimationMode, Viewport};

/// Margin from the window edges, in pixels.
const MARGIN: i32 = 10;

/// Longest edge of the minimap, in pixels.
const MAX_SIZE: i32 = 250;

/// Slide overview anchored to the bottom-right window corner.
pub struct Minimap {
    overview: Option<TextureHandle>,
    overview_width: i32,
    overview_height: i32,

    slide_width: i64,
    slide_height: i64,

    window_width: i32,
    window_height: i32,

    /// Screen placement, recomputed when the window resizes
    rect: ScreenRect,
}

impl Minimap {
    /// Build the overview from the coarsest level of `source`.
    ///
    /// A failed read produces a minimap that draws nothing but still
    /// answers `contains` with `false`, so callers need no special case.
    pub async fn build(
        source: &dyn SlideSource,
        renderer: &mut dyn Renderer,
        window_width: i32,
        window_height: i32,
    ) -> Self {
        let mut minimap = Self {
            overview: None,
            overview_width: 0,
            overview_height: 0,
            slide_width: source.width(),
            slide_height: source.height(),
            window_width,
            window_height,
            rect: ScreenRect::new(0, 0, 0, 0),
        };

        if !source.is_valid() || source.level_count() == 0 {
            error!("minimap: slide source not usable");
            return minimap;
        }

        let coarsest = source.level_count() - 1;
        let dims = source.level_dimensions(coarsest);
        let Some(overview) = source
            .read_region(coarsest, 0, 0, dims.width, dims.height)
            .await
        else {
            error!(level = coarsest, "minimap: overview read failed");
            return minimap;
        };

        minimap.overview = renderer.create_texture(
            overview.width() as u32,
            overview.height() as u32,
            overview.pixels(),
        );
        minimap.overview_width = overview.width();
        minimap.overview_height = overview.height();
        minimap.recompute_rect();

        info!(
            level = coarsest,
            width = minimap.overview_width,
            height = minimap.overview_height,
            "minimap overview ready"
        );
        minimap
    }

    pub fn set_window_size(&mut self, width: i32, height: i32) {
        self.window_width = width;
        self.window_height = height;
        self.recompute_rect();
    }

    pub fn render(&self, viewport: &Viewport, renderer: &mut dyn Renderer) {
        let Some(overview) = self.overview else {
            return;
        };

        renderer.set_blend_mode(BlendMode::Alpha);
        renderer.fill_rect(self.rect, Color::rgba(0, 0, 0, 128));
        renderer.draw_texture(overview, None, self.rect);
        renderer.draw_rect_outline(self.rect, Color::rgb(200, 200, 200));

        let indicator = self.viewport_indicator(viewport);
        renderer.draw_rect_outline(indicator, Color::rgb(255, 50, 50));
        // Doubled outline for visibility over busy tissue.
        renderer.draw_rect_outline(
            ScreenRect::new(
                indicator.x + 1,
                indicator.y + 1,
                (indicator.width - 2).max(0),
                (indicator.height - 2).max(0),
            ),
            Color::rgb(255, 50, 50),
        );
    }

    /// Whether a screen point lands on the minimap.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.overview.is_some() && self.rect.contains(x, y)
    }

    /// Jump the viewport to the slide position under a click.
    pub fn handle_click(&self, x: i32, y: i32, viewport: &mut Viewport) {
        if !self.contains(x, y) {
            return;
        }

        let fraction_x = (x - self.rect.x) as f64 / self.rect.width as f64;
        let fraction_y = (y - self.rect.y) as f64 / self.rect.height as f64;

        let target = Vec2::new(
            fraction_x * self.slide_width as f64,
            fraction_y * self.slide_height as f64,
        );
        viewport.center_on(target, AnimationMode::Smooth);
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    /// The visible region as a rectangle inside the minimap, clamped to a
    /// 2px minimum so it never vanishes.
    fn viewport_indicator(&self, viewport: &Viewport) -> ScreenRect {
        let region = viewport.visible_region();

        let left = region.x / self.slide_width as f64;
        let top = region.y / self.slide_height as f64;
        let width = region.width / self.slide_width as f64;
        let height = region.height / self.slide_height as f64;

        ScreenRect::new(
            self.rect.x + (left * self.rect.width as f64) as i32,
            self.rect.y + (top * self.rect.height as f64) as i32,
            ((width * self.rect.width as f64) as i32).max(2),
            ((height * self.rect.height as f64) as i32).max(2),
        )
    }

    fn recompute_rect(&mut self) {
        if self.overview_width == 0 || self.overview_height == 0 {
            return;
        }

        let aspect = self.overview_width as f64 / self.overview_height as f64;
        let (width, height) = if aspect >= 1.0 {
            let width = MAX_SIZE.min(self.overview_width);
            (width, (width as f64 / aspect) as i32)
        } else {
            let height = MAX_SIZE.min(self.overview_height);
            ((height as f64 * aspect) as i32, height)
        };

        self.rect = ScreenRect::new(
            self.window_width - width - MARGIN,
            self.window_height - height - MARGIN,
            width,
            height,
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
