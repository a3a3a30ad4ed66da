//! Viewport: the mapping between screen pixels and slide pixels.
//!
//! The viewport owns the pan/zoom state of the viewer. `zoom` is expressed
//! in screen pixels per slide pixel, so `zoom = 1.0` is a 1:1 mapping and
//! `zoom = 0.25` shows the slide at quarter scale. `position` is the slide
//! coordinate under the screen origin.
//!
//! Every navigation operation takes an [`AnimationMode`]: `Instant` applies
//! the target directly, `Smooth` eases toward it over a few hundred
//! milliseconds. The render loop drives animations by calling
//! [`Viewport::update`] with the current time, which keeps the viewport
//! deterministic and testable: no clock is read internally.

use crate::geom::{Rect, Vec2};

/// Default duration of a smooth transition.
pub const DEFAULT_ANIMATION_MS: f64 = 300.0;

/// Hard ceiling on magnification (4x beyond 1:1).
const MAX_ZOOM: f64 = 4.0;

/// Fallback zoom limits when slide dimensions are not known yet.
const FALLBACK_MIN_ZOOM: f64 = 0.01;

// =============================================================================
// Animation
// =============================================================================

/// How a navigation operation reaches its target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnimationMode {
    /// Jump to the target immediately
    Instant,
    /// Ease toward the target over [`DEFAULT_ANIMATION_MS`]
    Smooth,
}

/// Cubic ease-in-out, the easing used by every smooth transition.
///
/// `ease(0) = 0`, `ease(0.5) = 0.5`, `ease(1) = 1`, monotone on `[0, 1]`.
pub fn ease_in_out_cubic(p: f64) -> f64 {
    if p < 0.5 {
        4.0 * p * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Copy, Clone)]
struct Animation {
    start_pos: Vec2,
    target_pos: Vec2,
    start_zoom: f64,
    target_zoom: f64,
    /// Stamped on the first `update` after the operation that started it
    start_time_ms: Option<f64>,
    duration_ms: f64,
}

// =============================================================================
// Viewport
// =============================================================================

/// Screen-to-slide transform with clamped pan/zoom and animated transitions.
#[derive(Debug, Clone)]
pub struct Viewport {
    window_width: i32,
    window_height: i32,
    slide_width: i64,
    slide_height: i64,

    /// Slide coordinate of the screen origin
    position: Vec2,
    /// Screen pixels per slide pixel
    zoom: f64,

    min_zoom: f64,
    max_zoom: f64,

    animation: Option<Animation>,
}

impl Viewport {
    pub fn new(window_width: i32, window_height: i32, slide_width: i64, slide_height: i64) -> Self {
        let mut viewport = Self {
            window_width,
            window_height,
            slide_width,
            slide_height,
            position: Vec2::default(),
            zoom: 1.0,
            min_zoom: FALLBACK_MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            animation: None,
        };
        viewport.recompute_zoom_limits();
        viewport.reset_view(AnimationMode::Instant);
        viewport
    }

    // =========================================================================
    // Coordinate transforms
    // =========================================================================

    /// Screen pixels to slide coordinates.
    pub fn screen_to_slide(&self, screen: Vec2) -> Vec2 {
        screen / self.zoom + self.position
    }

    /// Slide coordinates to screen pixels.
    pub fn slide_to_screen(&self, slide: Vec2) -> Vec2 {
        (slide - self.position) * self.zoom
    }

    /// The part of the slide currently on screen, in slide coordinates.
    pub fn visible_region(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.window_width as f64 / self.zoom,
            self.window_height as f64 / self.zoom,
        )
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Shift the view by a delta expressed in slide coordinates.
    pub fn pan(&mut self, delta: Vec2, mode: AnimationMode) {
        let target = self.clamp_position(self.position + delta, self.zoom);
        self.apply(target, self.zoom, mode);
    }

    /// Zoom by `factor`, keeping the slide point under `screen_point` fixed.
    ///
    /// When the new zoom clamps to the current value the position is left
    /// untouched, so grinding against a zoom limit does not drift the view.
    pub fn zoom_at(&mut self, screen_point: Vec2, factor: f64, mode: AnimationMode) {
        let anchor = self.screen_to_slide(screen_point);

        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if new_zoom == self.zoom {
            return;
        }

        let target = self.clamp_position(anchor - screen_point / new_zoom, new_zoom);
        self.apply(target, new_zoom, mode);
    }

    /// Center the view on a slide point at the current zoom.
    pub fn center_on(&mut self, slide_point: Vec2, mode: AnimationMode) {
        let viewport_size = Vec2::new(
            self.window_width as f64 / self.zoom,
            self.window_height as f64 / self.zoom,
        );
        let target = self.clamp_position(slide_point - viewport_size / 2.0, self.zoom);
        self.apply(target, self.zoom, mode);
    }

    /// Fit the whole slide in the window, centered.
    pub fn reset_view(&mut self, mode: AnimationMode) {
        let zoom = self.min_zoom;
        let viewport_width = self.window_width as f64 / zoom;
        let viewport_height = self.window_height as f64 / zoom;
        let target = Vec2::new(
            (self.slide_width as f64 - viewport_width) / 2.0,
            (self.slide_height as f64 - viewport_height) / 2.0,
        );
        self.apply(self.clamp_position(target, zoom), zoom, mode);
    }

    pub fn set_window_size(&mut self, width: i32, height: i32) {
        self.window_width = width;
        self.window_height = height;
        self.recompute_zoom_limits();
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self.position = self.clamp_position(self.position, self.zoom);
    }

    pub fn set_slide_dimensions(&mut self, width: i64, height: i64) {
        self.slide_width = width;
        self.slide_height = height;
        self.recompute_zoom_limits();
        self.reset_view(AnimationMode::Instant);
    }

    // =========================================================================
    // Animation driving
    // =========================================================================

    /// Advance any running animation to `now_ms`. Returns `true` while an
    /// animation is still in progress.
    pub fn update(&mut self, now_ms: f64) -> bool {
        let Some(mut animation) = self.animation else {
            return false;
        };

        let start_time = *animation.start_time_ms.get_or_insert(now_ms);
        self.animation = Some(animation);

        let progress = if animation.duration_ms <= 0.0 {
            1.0
        } else {
            ((now_ms - start_time) / animation.duration_ms).clamp(0.0, 1.0)
        };
        let eased = ease_in_out_cubic(progress);

        self.position = animation.start_pos + (animation.target_pos - animation.start_pos) * eased;
        self.zoom = animation.start_zoom + (animation.target_zoom - animation.start_zoom) * eased;

        if progress >= 1.0 {
            // Land on the target exactly; easing arithmetic may be off by an ulp.
            self.position = animation.target_pos;
            self.zoom = animation.target_zoom;
            self.animation = None;
        }

        self.position = self.clamp_position(self.position, self.zoom);
        self.animation.is_some()
    }

    /// Abandon a running animation, freezing the view where it is.
    pub fn cancel_animation(&mut self) {
        self.animation = None;
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn window_size(&self) -> (i32, i32) {
        (self.window_width, self.window_height)
    }

    pub fn slide_dimensions(&self) -> (i64, i64) {
        (self.slide_width, self.slide_height)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn apply(&mut self, target_pos: Vec2, target_zoom: f64, mode: AnimationMode) {
        match mode {
            AnimationMode::Instant => {
                self.position = target_pos;
                self.zoom = target_zoom;
                self.animation = None;
            }
            AnimationMode::Smooth => {
                // Starting from the current (possibly mid-animation) state
                // replaces any animation in flight.
                self.animation = Some(Animation {
                    start_pos: self.position,
                    target_pos,
                    start_zoom: self.zoom,
                    target_zoom,
                    start_time_ms: None,
                    duration_ms: DEFAULT_ANIMATION_MS,
                });
            }
        }
    }

    /// Restore the position invariant for a given zoom: clamp to the slide
    /// when the view is smaller than the slide on an axis, center otherwise.
    fn clamp_position(&self, position: Vec2, zoom: f64) -> Vec2 {
        let viewport_width = self.window_width as f64 / zoom;
        let viewport_height = self.window_height as f64 / zoom;
        let slide_width = self.slide_width as f64;
        let slide_height = self.slide_height as f64;

        let x = if viewport_width >= slide_width {
            -(viewport_width - slide_width) / 2.0
        } else {
            position.x.clamp(0.0, slide_width - viewport_width)
        };

        let y = if viewport_height >= slide_height {
            -(viewport_height - slide_height) / 2.0
        } else {
            position.y.clamp(0.0, slide_height - viewport_height)
        };

        Vec2::new(x, y)
    }

    fn recompute_zoom_limits(&mut self) {
        if self.slide_width == 0 || self.slide_height == 0 {
            self.min_zoom = FALLBACK_MIN_ZOOM;
            self.max_zoom = MAX_ZOOM;
            return;
        }

        // Fit the whole slide with a small margin.
        let zoom_x = self.window_width as f64 / self.slide_width as f64;
        let zoom_y = self.window_height as f64 / self.slide_height as f64;
        self.min_zoom = zoom_x.min(zoom_y) * 0.95;
        self.max_zoom = MAX_ZOOM;
    }
}

// =============================================================================
// Tests
// =============================================================================
