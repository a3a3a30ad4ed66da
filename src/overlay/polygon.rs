//! Cell-polygon overlay.
//!
//! Millions of per-cell polygons can be loaded for one slide, so the
//! overlay leans on two tricks: a uniform-grid spatial index to cull to
//! the viewport, and per-polygon level-of-detail so distant cells cost a
//! point or a box instead of a triangulated outline. Triangulations are
//! computed the first time a polygon is actually drawn at full detail and
//! cached inside the polygon.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::geom::{Rect, Vec2};
use crate::overlay::index::{PolygonIndex, DEFAULT_GRID_SIZE};
use crate::overlay::triangulate::triangulate;
use crate::render::{BlendMode, Color, Renderer, Vertex};
use crate::viewport::Viewport;

// =============================================================================
// Polygon
// =============================================================================

/// One cell outline with its class and cached triangulation.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub class_id: i32,
    pub vertices: Vec<Vec2>,
    pub bounding_box: Rect,
    /// Filled in lazily on first full-detail draw
    triangle_indices: Option<Vec<u32>>,
}

impl Polygon {
    pub fn new(class_id: i32, vertices: Vec<Vec2>) -> Self {
        let bounding_box = Rect::bounding(&vertices);
        Self {
            class_id,
            vertices,
            bounding_box,
            triangle_indices: None,
        }
    }

    /// Triangle indices into `vertices`, triangulating on first use.
    pub fn triangles(&mut self) -> &[u32] {
        if self.triangle_indices.is_none() {
            self.triangle_indices = Some(triangulate(&self.vertices));
        }
        self.triangle_indices.as_deref().unwrap_or(&[])
    }
}

// =============================================================================
// Level of Detail
// =============================================================================

/// Rendering fidelity chosen per polygon from its on-screen size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LodLevel {
    /// Too small to see
    Skip,
    /// One pixel at the bounding-box center
    Point,
    /// Bounding box as two triangles
    Box,
    /// Full triangulated outline
    Full,
}

/// LOD cut-over points in on-screen pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LodThresholds {
    pub min_screen_size: f64,
    pub point_threshold: f64,
    pub box_threshold: f64,
    pub simplified_threshold: f64,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            min_screen_size: 2.0,
            point_threshold: 4.0,
            box_threshold: 8.0,
            simplified_threshold: 16.0,
        }
    }
}

impl LodThresholds {
    fn classify(&self, screen_size: f64) -> LodLevel {
        if screen_size < self.min_screen_size {
            LodLevel::Skip
        } else if screen_size < self.point_threshold {
            LodLevel::Point
        } else if screen_size < self.box_threshold {
            LodLevel::Box
        } else {
            // Between the box and simplified thresholds a decimated outline
            // would do; the full outline is drawn for both buckets.
            LodLevel::Full
        }
    }
}

// =============================================================================
// PolygonOverlay
// =============================================================================

/// Owns the polygon arena, per-class styling and the spatial index.
pub struct PolygonOverlay {
    polygons: Vec<Polygon>,

    class_colors: BTreeMap<i32, Color>,
    class_names: BTreeMap<i32, String>,
    class_visibility: BTreeMap<i32, bool>,
    class_counts: BTreeMap<i32, usize>,
    class_ids: Vec<i32>,

    index: Option<PolygonIndex>,
    slide_width: f64,
    slide_height: f64,

    visible: bool,
    opacity: f32,
    thresholds: LodThresholds,
}

impl PolygonOverlay {
    pub fn new() -> Self {
        Self {
            polygons: Vec::new(),
            class_colors: BTreeMap::new(),
            class_names: BTreeMap::new(),
            class_visibility: BTreeMap::new(),
            class_counts: BTreeMap::new(),
            class_ids: Vec::new(),
            index: None,
            slide_width: 0.0,
            slide_height: 0.0,
            visible: false,
            opacity: 0.5,
            thresholds: LodThresholds::default(),
        }
    }

    /// Replace the overlay contents. Colors missing from `colors` are not
    /// invented here; loaders assign palette colors before handing data in.
    pub fn set_data(
        &mut self,
        polygons: Vec<Polygon>,
        colors: BTreeMap<i32, Color>,
        names: BTreeMap<i32, String>,
    ) {
        self.polygons = polygons;
        self.class_colors = colors;
        self.class_names = names;
        self.class_visibility.clear();

        self.class_counts.clear();
        for polygon in &self.polygons {
            *self.class_counts.entry(polygon.class_id).or_insert(0) += 1;
        }
        self.class_ids = self.class_colors.keys().copied().collect();

        info!(
            polygons = self.polygons.len(),
            classes = self.class_ids.len(),
            "polygon overlay loaded"
        );
        self.rebuild_index();
    }

    /// Drop everything, including styling and the index.
    pub fn clear(&mut self) {
        self.polygons.clear();
        self.class_colors.clear();
        self.class_names.clear();
        self.class_visibility.clear();
        self.class_counts.clear();
        self.class_ids.clear();
        self.index = None;
        self.visible = false;
    }

    pub fn set_slide_dimensions(&mut self, width: f64, height: f64) {
        self.slide_width = width;
        self.slide_height = height;
        self.rebuild_index();
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    pub fn render(&mut self, viewport: &Viewport, renderer: &mut dyn Renderer) {
        if !self.visible || self.polygons.is_empty() {
            return;
        }

        let region = viewport.visible_region();
        let candidates: Vec<u32> = match &self.index {
            Some(index) => index.query(&region, &self.polygons),
            // Index not built yet (no slide dimensions): brute-force cull.
            None => self
                .polygons
                .iter()
                .enumerate()
                .filter(|(_, p)| p.bounding_box.intersects(&region))
                .map(|(id, _)| id as u32)
                .collect(),
        };
        if candidates.is_empty() {
            return;
        }

        let zoom = viewport.zoom();

        // Group by class so each batch carries one color.
        let mut batches: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
        for id in candidates {
            let polygon = &self.polygons[id as usize];
            if self.is_class_visible(polygon.class_id) {
                batches.entry(polygon.class_id).or_default().push(id);
            }
        }

        renderer.set_blend_mode(BlendMode::Alpha);
        let alpha = (self.opacity * 255.0) as u8;

        for (class_id, ids) in batches {
            let color = self.class_color(class_id).with_alpha(alpha);
            self.render_class_batch(&ids, color, zoom, viewport, renderer);
        }
    }

    fn render_class_batch(
        &mut self,
        ids: &[u32],
        color: Color,
        zoom: f64,
        viewport: &Viewport,
        renderer: &mut dyn Renderer,
    ) {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();

        for &id in ids {
            let bbox = self.polygons[id as usize].bounding_box;
            let screen_size = (bbox.width * zoom).max(bbox.height * zoom);

            match self.thresholds.classify(screen_size) {
                LodLevel::Skip => {}
                LodLevel::Point => {
                    let p = viewport.slide_to_screen(bbox.center());
                    renderer.draw_point(p.x as i32, p.y as i32, color);
                }
                LodLevel::Box => {
                    push_box(&mut vertices, &mut indices, &bbox, color, viewport);
                }
                LodLevel::Full => {
                    let polygon = &mut self.polygons[id as usize];
                    let base = vertices.len() as u32;
                    let triangles = polygon.triangles();
                    if triangles.is_empty() {
                        continue;
                    }
                    indices.extend(triangles.iter().map(|&i| base + i));
                    for &vertex in &polygon.vertices {
                        let p = viewport.slide_to_screen(vertex);
                        vertices.push(Vertex::new(p.x as f32, p.y as f32, color));
                    }
                }
            }
        }

        if !vertices.is_empty() && !indices.is_empty() {
            renderer.draw_triangles(&vertices, &indices);
        }
    }

    // =========================================================================
    // Styling & visibility
    // =========================================================================

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_lod_thresholds(&mut self, thresholds: LodThresholds) {
        self.thresholds = thresholds;
    }

    pub fn class_ids(&self) -> &[i32] {
        &self.class_ids
    }

    pub fn class_color(&self, class_id: i32) -> Color {
        self.class_colors
            .get(&class_id)
            .copied()
            .unwrap_or(crate::loader::fallback_color(class_id as usize))
    }

    pub fn set_class_color(&mut self, class_id: i32, color: Color) {
        self.class_colors.insert(class_id, color);
    }

    pub fn class_name(&self, class_id: i32) -> String {
        self.class_names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("Class {class_id}"))
    }

    pub fn class_count(&self, class_id: i32) -> usize {
        self.class_counts.get(&class_id).copied().unwrap_or(0)
    }

    /// Classes are visible unless explicitly hidden.
    pub fn is_class_visible(&self, class_id: i32) -> bool {
        self.class_visibility.get(&class_id).copied().unwrap_or(true)
    }

    pub fn set_class_visible(&mut self, class_id: i32, visible: bool) {
        self.class_visibility.insert(class_id, visible);
    }

    pub fn set_all_classes_visible(&mut self, visible: bool) {
        for &class_id in &self.class_ids {
            self.class_visibility.insert(class_id, visible);
        }
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn rebuild_index(&mut self) {
        if self.slide_width <= 0.0 || self.slide_height <= 0.0 || self.polygons.is_empty() {
            self.index = None;
            return;
        }

        debug!(polygons = self.polygons.len(), "building polygon index");
        let mut index = PolygonIndex::new(
            DEFAULT_GRID_SIZE,
            DEFAULT_GRID_SIZE,
            self.slide_width,
            self.slide_height,
        );
        index.build(&self.polygons);
        self.index = Some(index);
    }
}

impl Default for PolygonOverlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a bounding box as two triangles.
fn push_box(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    bbox: &Rect,
    color: Color,
    viewport: &Viewport,
) {
    let base = vertices.len() as u32;
    let corners = [
        Vec2::new(bbox.x, bbox.y),
        Vec2::new(bbox.x + bbox.width, bbox.y),
        Vec2::new(bbox.x + bbox.width, bbox.y + bbox.height),
        Vec2::new(bbox.x, bbox.y + bbox.height),
    ];
    for corner in corners {
        let p = viewport.slide_to_screen(corner);
        vertices.push(Vertex::new(p.x as f32, p.y as f32, color));
    }
    indices.extend_from_slice(&[base, base + 1, base + 3, base + 1, base + 2, base + 3]);
}

// =============================================================================
// Tests
// =============================================================================
