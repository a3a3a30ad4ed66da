//! Tissue-class raster overlay.
//!
//! Tissue segmentation arrives as per-tile rasters of class ids (one byte
//! per pixel at some pyramid level). Drawing maps every byte through a
//! 256-entry color LUT into an RGBA texture, cached per tile. Changing a
//! class color or visibility only rebuilds the LUT and invalidates the
//! textures; pixels are re-rastered lazily as tiles come back on screen.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use crate::geom::{Rect, Vec2};
use crate::loader::tissue_color;
use crate::overlay::index::{UniformGrid, DEFAULT_GRID_SIZE};
use crate::render::{BlendMode, Color, Renderer, ScreenRect, TextureHandle};
use crate::viewport::Viewport;

// =============================================================================
// Data Model
// =============================================================================

/// One raster tile of per-pixel class ids.
#[derive(Debug)]
pub struct TissueTile {
    pub level: i32,
    pub tile_x: i32,
    pub tile_y: i32,
    /// Raster dimensions in pixels
    pub width: i32,
    pub height: i32,
    /// `width * height` class ids, row-major
    pub class_data: Vec<u8>,

    /// `2^(max_level - level)`, filled in by `set_data`
    scale_factor: f64,
    /// Level-0 footprint, filled in by `set_data`
    bounds: Rect,

    texture: Option<TextureHandle>,
    texture_valid: bool,
}

impl TissueTile {
    pub fn new(
        level: i32,
        tile_x: i32,
        tile_y: i32,
        width: i32,
        height: i32,
        class_data: Vec<u8>,
    ) -> Self {
        Self {
            level,
            tile_x,
            tile_y,
            width,
            height,
            class_data,
            scale_factor: 1.0,
            bounds: Rect::default(),
            texture: None,
            texture_valid: false,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }
}

/// Metadata of one tissue class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TissueClass {
    pub class_id: i32,
    pub name: String,
    pub color: Color,
    pub visible: bool,
}

// =============================================================================
// TissueMapOverlay
// =============================================================================

/// Owns the tissue tiles, the class table and the color LUT.
pub struct TissueMapOverlay {
    tiles: Vec<TissueTile>,
    classes: Vec<TissueClass>,
    class_index: HashMap<i32, usize>,

    /// One entry per possible class byte; unknown or hidden classes are
    /// fully transparent
    color_lut: [Color; 256],

    index: Option<UniformGrid>,
    slide_width: f64,
    slide_height: f64,
    max_level: i32,

    visible: bool,
    opacity: f32,
}

impl TissueMapOverlay {
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            classes: Vec::new(),
            class_index: HashMap::new(),
            color_lut: [Color::TRANSPARENT; 256],
            index: None,
            slide_width: 0.0,
            slide_height: 0.0,
            max_level: 0,
            visible: false,
            opacity: 0.5,
        }
    }

    /// Replace the overlay contents.
    ///
    /// Tiles get their scale factor and level-0 bounds precomputed; the
    /// class table is built from `class_mapping` plus any class ids found
    /// in the rasters but missing from the mapping.
    pub fn set_data(
        &mut self,
        tiles: Vec<TissueTile>,
        class_mapping: &BTreeMap<i32, String>,
        max_level: i32,
        renderer: &mut dyn Renderer,
    ) {
        self.destroy_textures(renderer);
        self.tiles = tiles;
        self.classes.clear();
        self.class_index.clear();
        self.index = None;
        self.max_level = max_level;

        for tile in &mut self.tiles {
            tile.scale_factor = 2f64.powi(max_level - tile.level);
            tile.bounds = Rect::new(
                tile.tile_x as f64 * tile.width as f64 * tile.scale_factor,
                tile.tile_y as f64 * tile.height as f64 * tile.scale_factor,
                tile.width as f64 * tile.scale_factor,
                tile.height as f64 * tile.scale_factor,
            );
            tile.texture = None;
            tile.texture_valid = false;
        }

        for (&class_id, name) in class_mapping {
            self.register_class(class_id, name.clone());
        }

        // Rasters may carry ids the mapping never mentioned.
        let unmapped: Vec<i32> = {
            let mut ids = Vec::new();
            for tile in &self.tiles {
                for &class_id in &tile.class_data {
                    if !self.class_index.contains_key(&(class_id as i32))
                        && !ids.contains(&(class_id as i32))
                    {
                        ids.push(class_id as i32);
                    }
                }
            }
            ids
        };
        for class_id in unmapped {
            self.register_class(class_id, format!("Class {class_id}"));
        }

        self.rebuild_color_lut();
        self.rebuild_index();

        info!(
            tiles = self.tiles.len(),
            classes = self.classes.len(),
            max_level,
            "tissue overlay loaded"
        );
    }

    pub fn clear(&mut self, renderer: &mut dyn Renderer) {
        self.destroy_textures(renderer);
        self.tiles.clear();
        self.classes.clear();
        self.class_index.clear();
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
        if !self.visible || self.tiles.is_empty() {
            return;
        }

        let region = viewport.visible_region();
        renderer.set_blend_mode(BlendMode::Alpha);

        let visible_ids: Vec<u32> = match &self.index {
            Some(index) => index
                .query(&region)
                .into_iter()
                .filter(|&id| {
                    self.tiles
                        .get(id as usize)
                        .is_some_and(|t| t.bounds.intersects(&region))
                })
                .collect(),
            None => self
                .tiles
                .iter()
                .enumerate()
                .filter(|(_, t)| t.bounds.intersects(&region))
                .map(|(id, _)| id as u32)
                .collect(),
        };

        let alpha = (self.opacity * 255.0) as u8;
        let color_lut = self.color_lut;
        for id in visible_ids {
            let tile = &mut self.tiles[id as usize];
            ensure_texture(tile, &color_lut, renderer);
            let Some(texture) = tile.texture else {
                continue;
            };

            let top_left = viewport.slide_to_screen(Vec2::new(tile.bounds.x, tile.bounds.y));
            let bottom_right = viewport.slide_to_screen(Vec2::new(
                tile.bounds.x + tile.bounds.width,
                tile.bounds.y + tile.bounds.height,
            ));

            // Floor/ceil so adjacent tiles leave no seams.
            let x = top_left.x.floor();
            let y = top_left.y.floor();
            let dst = ScreenRect::new(
                x as i32,
                y as i32,
                (bottom_right.x - x).ceil() as i32,
                (bottom_right.y - y).ceil() as i32,
            );

            renderer.set_texture_alpha(texture, alpha);
            renderer.draw_texture(texture, None, dst);
        }
    }

    // =========================================================================
    // Class table & styling
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

    pub fn class_ids(&self) -> Vec<i32> {
        self.classes.iter().map(|c| c.class_id).collect()
    }

    pub fn class_name(&self, class_id: i32) -> String {
        self.class_index
            .get(&class_id)
            .map(|&i| self.classes[i].name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn class_color(&self, class_id: i32) -> Color {
        self.class_index
            .get(&class_id)
            .map(|&i| self.classes[i].color)
            .unwrap_or(Color::rgb(128, 128, 128))
    }

    pub fn is_class_visible(&self, class_id: i32) -> bool {
        self.class_index
            .get(&class_id)
            .map(|&i| self.classes[i].visible)
            .unwrap_or(false)
    }

    pub fn set_class_visible(&mut self, class_id: i32, visible: bool) {
        if let Some(&i) = self.class_index.get(&class_id) {
            self.classes[i].visible = visible;
            self.rebuild_color_lut();
            self.invalidate_textures();
        }
    }

    pub fn set_class_color(&mut self, class_id: i32, color: Color) {
        if let Some(&i) = self.class_index.get(&class_id) {
            self.classes[i].color = color;
            self.rebuild_color_lut();
            self.invalidate_textures();
        }
    }

    pub fn set_all_classes_visible(&mut self, visible: bool) {
        for class in &mut self.classes {
            class.visible = visible;
        }
        self.rebuild_color_lut();
        self.invalidate_textures();
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn register_class(&mut self, class_id: i32, name: String) {
        self.class_index.insert(class_id, self.classes.len());
        self.classes.push(TissueClass {
            class_id,
            name,
            color: tissue_color(class_id),
            visible: true,
        });
    }

    fn rebuild_color_lut(&mut self) {
        self.color_lut = [Color::TRANSPARENT; 256];
        for class in &self.classes {
            if (0..256).contains(&class.class_id) && class.visible {
                self.color_lut[class.class_id as usize] = class.color;
            }
        }
    }

    fn invalidate_textures(&mut self) {
        for tile in &mut self.tiles {
            tile.texture_valid = false;
        }
    }

    fn destroy_textures(&mut self, renderer: &mut dyn Renderer) {
        for tile in &mut self.tiles {
            if let Some(texture) = tile.texture.take() {
                renderer.destroy_texture(texture);
            }
            tile.texture_valid = false;
        }
    }

    fn rebuild_index(&mut self) {
        if self.slide_width <= 0.0 || self.slide_height <= 0.0 || self.tiles.is_empty() {
            self.index = None;
            return;
        }

        let mut grid = UniformGrid::new(
            DEFAULT_GRID_SIZE,
            DEFAULT_GRID_SIZE,
            self.slide_width,
            self.slide_height,
        );
        for (id, tile) in self.tiles.iter().enumerate() {
            grid.insert(id as u32, &tile.bounds);
        }
        self.index = Some(grid);
    }
}

impl Default for TissueMapOverlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Rasterize the tile through the LUT and (re)upload its texture.
fn ensure_texture(tile: &mut TissueTile, color_lut: &[Color; 256], renderer: &mut dyn Renderer) {
    if tile.texture.is_some() && tile.texture_valid {
        return;
    }
    if tile.width <= 0 || tile.height <= 0 {
        return;
    }

    let expected = tile.width as usize * tile.height as usize;
    if tile.class_data.len() != expected {
        warn!(
            level = tile.level,
            tile_x = tile.tile_x,
            tile_y = tile.tile_y,
            expected,
            actual = tile.class_data.len(),
            "tissue raster size mismatch"
        );
        return;
    }

    let mut pixels = Vec::with_capacity(expected * 4);
    for &class_id in &tile.class_data {
        let color = color_lut[class_id as usize];
        pixels.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    match tile.texture {
        Some(texture) => {
            if renderer.update_texture(texture, &pixels) {
                tile.texture_valid = true;
            } else {
                tile.texture = None;
            }
        }
        None => {
            tile.texture = renderer.create_texture(tile.width as u32, tile.height as u32, &pixels);
            tile.texture_valid = tile.texture.is_some();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
