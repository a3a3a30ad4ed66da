//! Tile cache eviction and statistics.

use pathview::{TileCache, TileData, TileKey};

fn key(x: i32) -> TileKey {
    TileKey::new(0, x, 0)
}

fn tile_of(bytes: usize) -> TileData {
    TileData::new((bytes / 4) as i32, 1, vec![0; bytes])
}

#[test]
fn eviction_drops_least_recently_inserted() {
    let mut cache = TileCache::with_capacity(500_000);

    cache.insert(key(0), tile_of(200_000)); // A
    cache.insert(key(1), tile_of(200_000)); // B
    cache.insert(key(2), tile_of(200_000)); // C

    assert!(!cache.has(&key(0)));
    assert!(cache.has(&key(1)));
    assert!(cache.has(&key(2)));
    assert_eq!(cache.memory_usage(), 400_000);
}

#[test]
fn access_rescues_from_eviction() {
    let mut cache = TileCache::with_capacity(500_000);

    cache.insert(key(0), tile_of(200_000)); // A
    cache.insert(key(1), tile_of(200_000)); // B
    cache.get(&key(0));
    cache.insert(key(2), tile_of(200_000)); // C evicts B

    assert!(cache.has(&key(0)));
    assert!(!cache.has(&key(1)));
    assert!(cache.has(&key(2)));
}

#[test]
fn memory_stays_within_budget() {
    let mut cache = TileCache::with_capacity(1_000_000);

    for x in 0..50 {
        cache.insert(key(x), tile_of(64_000));
        assert!(cache.memory_usage() <= cache.max_memory());
    }
    assert!(cache.tile_count() < 50);
}

#[test]
fn stats_accumulate_and_survive_clear() {
    let mut cache = TileCache::with_capacity(1_000_000);

    cache.insert(key(0), tile_of(4_000));
    cache.get(&key(0));
    cache.get(&key(1));
    cache.get(&key(2));

    let before = cache.stats();
    assert_eq!(before.hits, 1);
    assert_eq!(before.misses, 2);
    assert!((before.hit_rate() - 1.0 / 3.0).abs() < 1e-12);

    cache.clear();
    let after = cache.stats();
    assert_eq!(after.hits, 1);
    assert_eq!(after.misses, 2);
    assert_eq!(after.tile_count, 0);
    assert_eq!(after.memory_usage, 0);
}

#[test]
fn hits_plus_misses_is_monotone() {
    let mut cache = TileCache::with_capacity(1_000_000);
    let mut last_total = 0;

    for x in 0..20 {
        if x % 3 == 0 {
            cache.insert(key(x), tile_of(4_000));
        }
        cache.get(&key(x % 5));
        let stats = cache.stats();
        let total = stats.hits + stats.misses;
        assert!(total > last_total);
        last_total = total;
    }
}
