//! Tile engine: level selection, async fetching and progressive fallback.

use std::sync::Arc;
use std::time::Duration;

use pathview::{AnimationMode, TextureCache, TileEngine, Vec2, Viewport};

use super::test_utils::{MockSlideSource, RecordingRenderer};

fn engine_over(source: MockSlideSource) -> TileEngine {
    TileEngine::new(Arc::new(source), tokio::runtime::Handle::current())
}

/// Pump the engine until its pending fetches land in the cache.
async fn settle(engine: &mut TileEngine) {
    for _ in 0..500 {
        engine.pump_completions();
        if engine.pending_fetches() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("fetches did not settle");
}

#[tokio::test]
async fn level_selection_scenarios() {
    let engine = engine_over(MockSlideSource::new(100_000, 80_000, &[1.0, 2.0, 4.0, 8.0]));

    assert_eq!(engine.select_level(1.0), 0);
    assert_eq!(engine.select_level(0.5), 1);
    assert_eq!(engine.select_level(0.25), 2);
    assert_eq!(engine.select_level(0.125), 3);
    assert_eq!(engine.select_level(0.1), 3);
    assert_eq!(engine.select_level(10.0), 0);
}

#[tokio::test]
async fn level_selection_between_levels_prefers_higher_resolution() {
    let engine = engine_over(MockSlideSource::new(100_000, 80_000, &[1.0, 2.0, 4.0]));
    assert_eq!(engine.select_level(0.667), 0);
}

#[tokio::test]
async fn first_frame_enqueues_then_draws_exact_tiles() {
    let mut engine = engine_over(MockSlideSource::new(100_000, 80_000, &[1.0, 2.0, 4.0, 8.0]));
    let mut renderer = RecordingRenderer::new();
    let mut textures = TextureCache::new();

    let mut viewport = Viewport::new(1024, 768, 100_000, 80_000);
    viewport.zoom_at(
        Vec2::new(512.0, 384.0),
        1.0 / viewport.zoom(),
        AnimationMode::Instant,
    );

    // Nothing cached: the first frame draws no pixels but schedules work.
    engine.render(&viewport, &mut renderer, &mut textures);
    assert_eq!(renderer.texture_draws.len(), 0);
    assert!(engine.pending_fetches() > 0);

    settle(&mut engine).await;
    engine.render(&viewport, &mut renderer, &mut textures);

    let expected = engine.visible_tiles(&viewport, engine.select_level(viewport.zoom()));
    assert_eq!(renderer.exact_draws(), expected.len());
    assert_eq!(renderer.fallback_draws(), 0);
}

#[tokio::test]
async fn coarser_ancestor_fills_in_while_exact_tiles_load() {
    let mut engine = engine_over(MockSlideSource::new(100_000, 80_000, &[1.0, 2.0, 4.0, 8.0]));
    let mut renderer = RecordingRenderer::new();
    let mut textures = TextureCache::new();

    // Warm the cache at the zoomed-out level first.
    let mut viewport = Viewport::new(1024, 768, 100_000, 80_000);
    viewport.zoom_at(
        Vec2::new(512.0, 384.0),
        0.25 / viewport.zoom(),
        AnimationMode::Instant,
    );
    engine.render(&viewport, &mut renderer, &mut textures);
    settle(&mut engine).await;
    engine.render(&viewport, &mut renderer, &mut textures);
    assert!(renderer.exact_draws() > 0);

    // Jump to full resolution: the level-2 tiles are still the best we
    // have, so the frame paints ancestor sub-regions and schedules the
    // exact tiles.
    renderer.texture_draws.clear();
    viewport.zoom_at(Vec2::new(512.0, 384.0), 4.0, AnimationMode::Instant);
    engine.render(&viewport, &mut renderer, &mut textures);

    assert!(renderer.fallback_draws() > 0, "expected ancestor sub-region draws");
    assert_eq!(renderer.exact_draws(), 0);
    assert!(engine.pending_fetches() > 0);

    // Once fetches land, the same view draws exact level-0 tiles.
    settle(&mut engine).await;
    renderer.texture_draws.clear();
    engine.render(&viewport, &mut renderer, &mut textures);
    assert!(renderer.exact_draws() > 0);
    assert_eq!(renderer.fallback_draws(), 0);
}

#[tokio::test]
async fn failed_reads_leave_slot_empty_and_retire() {
    let mut engine = engine_over(
        MockSlideSource::new(100_000, 80_000, &[1.0, 2.0]).failing_level(0),
    );
    let mut renderer = RecordingRenderer::new();
    let mut textures = TextureCache::new();

    let mut viewport = Viewport::new(1024, 768, 100_000, 80_000);
    viewport.zoom_at(
        Vec2::new(512.0, 384.0),
        1.0 / viewport.zoom(),
        AnimationMode::Instant,
    );

    engine.render(&viewport, &mut renderer, &mut textures);
    settle(&mut engine).await;

    // The failed tiles were not cached and nothing was drawn for them.
    assert_eq!(engine.cache().tile_count(), 0);
    engine.render(&viewport, &mut renderer, &mut textures);
    assert_eq!(renderer.exact_draws(), 0);
}

#[tokio::test]
async fn textures_are_pruned_to_the_cache_working_set() {
    // A cache that holds only one tile forces constant eviction.
    let source = MockSlideSource::new(100_000, 80_000, &[1.0, 2.0, 4.0, 8.0]);
    let mut engine = TileEngine::with_config(
        Arc::new(source),
        tokio::runtime::Handle::current(),
        4,
        512 * 512 * 4,
    );
    let mut renderer = RecordingRenderer::new();
    let mut textures = TextureCache::new();

    let mut viewport = Viewport::new(1024, 768, 100_000, 80_000);
    viewport.zoom_at(
        Vec2::new(512.0, 384.0),
        1.0 / viewport.zoom(),
        AnimationMode::Instant,
    );

    engine.render(&viewport, &mut renderer, &mut textures);
    settle(&mut engine).await;

    // Run past the prune interval; stale textures must be destroyed.
    for _ in 0..pathview::tile::TEXTURE_PRUNE_INTERVAL + 5 {
        engine.render(&viewport, &mut renderer, &mut textures);
    }
    assert!(textures.len() <= engine.cache().tile_count().max(1));
    assert_eq!(renderer.live_textures, textures.len());
}

#[tokio::test]
async fn duplicate_visible_tiles_fetch_once() {
    let source = Arc::new(MockSlideSource::new(100_000, 80_000, &[1.0, 2.0]));
    let mut engine = TileEngine::new(source.clone(), tokio::runtime::Handle::current());
    let mut renderer = RecordingRenderer::new();
    let mut textures = TextureCache::new();

    let mut viewport = Viewport::new(1024, 768, 100_000, 80_000);
    viewport.zoom_at(
        Vec2::new(512.0, 384.0),
        1.0 / viewport.zoom(),
        AnimationMode::Instant,
    );

    // Rendering repeatedly before completions must not duplicate work.
    engine.render(&viewport, &mut renderer, &mut textures);
    let pending = engine.pending_fetches();
    engine.render(&viewport, &mut renderer, &mut textures);
    engine.render(&viewport, &mut renderer, &mut textures);
    assert_eq!(engine.pending_fetches(), pending);

    // Each visible tile reached the source exactly once.
    settle(&mut engine).await;
    assert_eq!(source.read_count(), pending);
}
