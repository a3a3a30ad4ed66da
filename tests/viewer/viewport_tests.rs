//! Viewport transforms, clamping and animation completion.

use pathview::{AnimationMode, Vec2, Viewport};

#[test]
fn anchored_zoom_keeps_cursor_point() {
    // Window 1920x1080, slide 10000x8000, start fitted and centered.
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);
    let cursor = Vec2::new(960.0, 540.0);

    let before = viewport.screen_to_slide(cursor);
    viewport.zoom_at(cursor, 2.0, AnimationMode::Instant);
    viewport.update(f64::INFINITY);
    let after = viewport.screen_to_slide(cursor);

    assert!((before.x - after.x).abs() < 50.0);
    assert!((before.y - after.y).abs() < 50.0);
}

#[test]
fn transform_round_trip_after_navigation() {
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);

    viewport.zoom_at(Vec2::new(700.0, 400.0), 3.0, AnimationMode::Smooth);
    viewport.update(0.0);
    viewport.update(1_000.0);
    viewport.pan(Vec2::new(-200.0, 150.0), AnimationMode::Smooth);
    viewport.update(1_000.0);
    viewport.update(10_000.0);
    assert!(!viewport.is_animating());

    for point in [
        Vec2::new(0.0, 0.0),
        Vec2::new(960.0, 540.0),
        Vec2::new(1919.0, 1079.0),
    ] {
        let round_trip = viewport.slide_to_screen(viewport.screen_to_slide(point));
        assert!((round_trip.x - point.x).abs() < 1.0);
        assert!((round_trip.y - point.y).abs() < 1.0);
    }
}

#[test]
fn position_clamped_whenever_view_fits_in_slide() {
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);

    for (cursor, factor, pan) in [
        (Vec2::new(0.0, 0.0), 10.0, Vec2::new(-1e7, -1e7)),
        (Vec2::new(1920.0, 1080.0), 0.3, Vec2::new(1e7, 1e7)),
        (Vec2::new(500.0, 900.0), 2.5, Vec2::new(3_000.0, -2_500.0)),
    ] {
        viewport.zoom_at(cursor, factor, AnimationMode::Instant);
        viewport.pan(pan, AnimationMode::Instant);

        let region = viewport.visible_region();
        if region.width <= 10_000.0 {
            assert!(viewport.position().x >= -1e-9);
            assert!(viewport.position().x <= 10_000.0 - region.width + 1e-9);
        }
        if region.height <= 8_000.0 {
            assert!(viewport.position().y >= -1e-9);
            assert!(viewport.position().y <= 8_000.0 - region.height + 1e-9);
        }
    }
}

#[test]
fn animation_lands_exactly_on_target_after_duration() {
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);
    viewport.zoom_at(Vec2::new(960.0, 540.0), 4.0, AnimationMode::Instant);
    let start = viewport.position();

    viewport.pan(Vec2::new(400.0, 250.0), AnimationMode::Smooth);
    viewport.update(5_000.0);

    // Evaluate far past the end: target exactly, animation finished.
    assert!(!viewport.update(5_000.0 + 100_000.0));
    assert_eq!(
        viewport.position(),
        Vec2::new(start.x + 400.0, start.y + 250.0)
    );
    assert!(!viewport.is_animating());
}

#[test]
fn reset_view_fits_and_centers() {
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);
    viewport.zoom_at(Vec2::new(100.0, 100.0), 8.0, AnimationMode::Instant);
    viewport.pan(Vec2::new(2_000.0, 2_000.0), AnimationMode::Instant);

    viewport.reset_view(AnimationMode::Instant);
    assert_eq!(viewport.zoom(), viewport.min_zoom());

    let center = viewport.visible_region().center();
    assert!((center.x - 5_000.0).abs() < 1.0);
    assert!((center.y - 4_000.0).abs() < 1.0);
}

#[test]
fn slide_swap_resets_the_view() {
    let mut viewport = Viewport::new(1920, 1080, 10_000, 8_000);
    viewport.zoom_at(Vec2::new(960.0, 540.0), 6.0, AnimationMode::Instant);

    viewport.set_slide_dimensions(40_000, 30_000);
    assert_eq!(viewport.zoom(), viewport.min_zoom());
    assert_eq!(viewport.slide_dimensions(), (40_000, 30_000));
}
