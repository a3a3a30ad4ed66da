//! Uniform-grid spatial indexing for overlay geometry.
//!
//! Overlays own their geometry in flat arenas (`Vec<Polygon>`,
//! `Vec<TissueTile>`); the index stores `u32` arena positions, never
//! references. Growing or moving the arena can therefore never leave the
//! index dangling: rebuild it and the ids stay meaningful.

use tracing::debug;

use crate::geom::Rect;
use crate::overlay::Polygon;

/// Grid resolution used by the overlays. 100x100 keeps cells around the
/// size of a high-zoom viewport for typical slides.
pub const DEFAULT_GRID_SIZE: usize = 100;

// =============================================================================
// UniformGrid
// =============================================================================

/// Grid of cells over slide space, each holding the ids of items whose
/// bounding box overlaps it.
pub struct UniformGrid {
    grid_width: usize,
    grid_height: usize,
    cell_width: f64,
    cell_height: f64,
    /// Row-major `grid_width * grid_height` cells
    cells: Vec<Vec<u32>>,
}

impl UniformGrid {
    pub fn new(grid_width: usize, grid_height: usize, slide_width: f64, slide_height: f64) -> Self {
        let grid_width = grid_width.max(1);
        let grid_height = grid_height.max(1);
        Self {
            grid_width,
            grid_height,
            cell_width: slide_width / grid_width as f64,
            cell_height: slide_height / grid_height as f64,
            cells: vec![Vec::new(); grid_width * grid_height],
        }
    }

    /// Register `id` in every cell its bounding box overlaps.
    pub fn insert(&mut self, id: u32, bounds: &Rect) {
        let (min_x, min_y) = self.cell_of(bounds.x, bounds.y);
        let (max_x, max_y) = self.cell_of(bounds.x + bounds.width, bounds.y + bounds.height);

        for cell_y in min_y..=max_y {
            for cell_x in min_x..=max_x {
                self.cells[cell_y * self.grid_width + cell_x].push(id);
            }
        }
    }

    /// Ids of candidate items near `region`, deduplicated and sorted.
    /// Callers still filter against real bounding boxes: grid quantization
    /// admits false positives.
    pub fn query(&self, region: &Rect) -> Vec<u32> {
        let (min_x, min_y) = self.cell_of(region.x, region.y);
        let (max_x, max_y) = self.cell_of(region.x + region.width, region.y + region.height);

        let mut candidates = Vec::new();
        for cell_y in min_y..=max_y {
            for cell_x in min_x..=max_x {
                candidates.extend_from_slice(&self.cells[cell_y * self.grid_width + cell_x]);
            }
        }

        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }

    /// Empty every cell, keeping the grid geometry.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Occupancy statistics: `(non-empty cells, total entries, max per cell)`.
    pub fn occupancy(&self) -> (usize, usize, usize) {
        let mut non_empty = 0;
        let mut total = 0;
        let mut max_per_cell = 0;
        for cell in &self.cells {
            if !cell.is_empty() {
                non_empty += 1;
                total += cell.len();
                max_per_cell = max_per_cell.max(cell.len());
            }
        }
        (non_empty, total, max_per_cell)
    }

    fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let cell_x = if self.cell_width > 0.0 {
            (x / self.cell_width) as isize
        } else {
            0
        };
        let cell_y = if self.cell_height > 0.0 {
            (y / self.cell_height) as isize
        } else {
            0
        };
        (
            cell_x.clamp(0, self.grid_width as isize - 1) as usize,
            cell_y.clamp(0, self.grid_height as isize - 1) as usize,
        )
    }
}

// =============================================================================
// PolygonIndex
// =============================================================================

/// Spatial index over a polygon arena.
pub struct PolygonIndex {
    grid: UniformGrid,
}

impl PolygonIndex {
    pub fn new(grid_width: usize, grid_height: usize, slide_width: f64, slide_height: f64) -> Self {
        Self {
            grid: UniformGrid::new(grid_width, grid_height, slide_width, slide_height),
        }
    }

    /// Index every polygon in the arena by its bounding box.
    pub fn build(&mut self, polygons: &[Polygon]) {
        self.grid.clear();
        for (id, polygon) in polygons.iter().enumerate() {
            self.grid.insert(id as u32, &polygon.bounding_box);
        }

        let (non_empty, total, max_per_cell) = self.grid.occupancy();
        debug!(
            polygons = polygons.len(),
            occupied_cells = non_empty,
            entries = total,
            max_per_cell,
            "spatial index built"
        );
    }

    /// Arena ids of polygons whose bounding box intersects `region`, each
    /// at most once.
    pub fn query(&self, region: &Rect, polygons: &[Polygon]) -> Vec<u32> {
        self.grid
            .query(region)
            .into_iter()
            .filter(|&id| {
                polygons
                    .get(id as usize)
                    .is_some_and(|p| p.bounding_box.intersects(region))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
