//! Polygon triangulation, spatial-index containment and overlay drawing.

use std::collections::BTreeMap;

use pathview::overlay::triangulate;
use pathview::{
    AnimationMode, Color, Polygon, PolygonIndex, PolygonOverlay, Rect, TissueMapOverlay,
    TissueTile, Vec2, Viewport,
};

use super::test_utils::RecordingRenderer;

// =============================================================================
// Triangulation
// =============================================================================

#[test]
fn pentagon_triangulates_into_three_triangles() {
    let indices = triangulate(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(10.0, 0.0),
        Vec2::new(12.0, 8.0),
        Vec2::new(5.0, 12.0),
        Vec2::new(-2.0, 8.0),
    ]);

    assert_eq!(indices.len(), 9);
    for triangle in indices.chunks(3) {
        assert_ne!(triangle[0], triangle[1]);
        assert_ne!(triangle[1], triangle[2]);
        assert_ne!(triangle[0], triangle[2]);
        for &index in triangle {
            assert!(index < 5);
        }
    }
}

#[test]
fn triangulation_output_size_for_simple_polygons() {
    for n in 3..=20 {
        let vertices: Vec<Vec2> = (0..n)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / n as f64;
                Vec2::new(angle.cos() * 50.0, angle.sin() * 50.0)
            })
            .collect();
        let indices = triangulate(&vertices);
        assert_eq!(indices.len(), 3 * (n - 2), "n = {n}");
    }
}

// =============================================================================
// Polygon Index
// =============================================================================

fn square(x: f64, y: f64, size: f64) -> Polygon {
    Polygon::new(
        0,
        vec![
            Vec2::new(x, y),
            Vec2::new(x + size, y),
            Vec2::new(x + size, y + size),
            Vec2::new(x, y + size),
        ],
    )
}

#[test]
fn index_containment_scenario() {
    // Slide 10000x8000, grid 100x100, one 50x50 polygon at (100, 100).
    let polygons = vec![square(100.0, 100.0, 50.0)];
    let mut index = PolygonIndex::new(100, 100, 10_000.0, 8_000.0);
    index.build(&polygons);

    assert_eq!(
        index.query(&Rect::new(90.0, 90.0, 70.0, 70.0), &polygons).len(),
        1
    );
    assert_eq!(
        index
            .query(&Rect::new(200.0, 200.0, 100.0, 100.0), &polygons)
            .len(),
        0
    );
}

#[test]
fn index_returns_each_polygon_once() {
    // Large polygons overlapping many cells, queried with a huge region.
    let polygons: Vec<Polygon> = (0..10)
        .map(|i| square(i as f64 * 400.0, 300.0, 900.0))
        .collect();
    let mut index = PolygonIndex::new(100, 100, 10_000.0, 8_000.0);
    index.build(&polygons);

    let ids = index.query(&Rect::new(0.0, 0.0, 10_000.0, 8_000.0), &polygons);
    assert_eq!(ids.len(), 10);
    let mut deduped = ids.clone();
    deduped.dedup();
    assert_eq!(deduped, ids);
}

// =============================================================================
// Overlay Rendering
// =============================================================================

/// Viewport at 1:1 zoom looking at the top-left slide corner.
fn unit_viewport() -> Viewport {
    let mut viewport = Viewport::new(1000, 800, 10_000, 8_000);
    viewport.zoom_at(
        Vec2::new(0.0, 0.0),
        1.0 / viewport.zoom(),
        AnimationMode::Instant,
    );
    viewport.center_on(Vec2::new(500.0, 400.0), AnimationMode::Instant);
    viewport
}

#[test]
fn polygon_overlay_draws_batches_per_class() {
    let mut overlay = PolygonOverlay::new();
    overlay.set_slide_dimensions(10_000.0, 8_000.0);

    let mut polygons = Vec::new();
    for i in 0..3 {
        let mut p = square(100.0 + i as f64 * 150.0, 100.0, 100.0);
        p.class_id = i;
        polygons.push(p);
    }
    let colors: BTreeMap<i32, Color> = (0..3).map(|i| (i, Color::rgb(10 * i as u8, 0, 0))).collect();
    overlay.set_data(polygons, colors, BTreeMap::new());
    overlay.set_visible(true);

    let mut renderer = RecordingRenderer::new();
    overlay.render(&unit_viewport(), &mut renderer);

    // One triangle batch per class, each a 4-vertex 6-index square.
    assert_eq!(renderer.triangle_batches.len(), 3);
    for &(vertex_count, index_count) in &renderer.triangle_batches {
        assert_eq!(vertex_count, 4);
        assert_eq!(index_count, 6);
    }
}

#[test]
fn polygon_overlay_respects_global_and_class_visibility() {
    let mut overlay = PolygonOverlay::new();
    overlay.set_slide_dimensions(10_000.0, 8_000.0);
    overlay.set_data(
        vec![square(100.0, 100.0, 100.0)],
        BTreeMap::from([(0, Color::rgb(255, 0, 0))]),
        BTreeMap::new(),
    );

    let mut renderer = RecordingRenderer::new();
    overlay.render(&unit_viewport(), &mut renderer);
    assert!(renderer.triangle_batches.is_empty(), "hidden by default");

    overlay.set_visible(true);
    overlay.set_class_visible(0, false);
    overlay.render(&unit_viewport(), &mut renderer);
    assert!(renderer.triangle_batches.is_empty(), "class hidden");

    overlay.set_class_visible(0, true);
    overlay.render(&unit_viewport(), &mut renderer);
    assert_eq!(renderer.triangle_batches.len(), 1);
}

#[test]
fn tissue_overlay_draws_visible_tiles_and_invalidates() {
    let mut overlay = TissueMapOverlay::new();
    let mut renderer = RecordingRenderer::new();

    overlay.set_slide_dimensions(10_000.0, 8_000.0);
    // 256x256 raster at the max level: bounds (0,0,256,256).
    overlay.set_data(
        vec![TissueTile::new(2, 0, 0, 256, 256, vec![1; 256 * 256])],
        &BTreeMap::from([(1, "stroma".to_string())]),
        2,
        &mut renderer,
    );
    overlay.set_visible(true);

    let viewport = unit_viewport();
    overlay.render(&viewport, &mut renderer);
    assert_eq!(renderer.texture_draws.len(), 1);
    assert_eq!(renderer.live_textures, 1);

    // Hiding the only class keeps the tile but repaints it transparent.
    overlay.set_class_visible(1, false);
    overlay.render(&viewport, &mut renderer);
    assert_eq!(renderer.texture_draws.len(), 2);
}
