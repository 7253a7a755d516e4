use super::*;
use crate::foundation::core::{ISize, Rgba8};

fn image(side: u32) -> PortableImage {
    PortableImage::solid(ISize::new(side, side), Rgba8::opaque(10, 20, 30)).unwrap()
}

fn key(id: u64) -> RasterCacheKey {
    RasterCacheKey::new(LayerId(id), RasterCacheKeyKind::Picture, &Affine::IDENTITY)
}

fn config() -> RasterCacheConfig {
    RasterCacheConfig {
        cost_threshold: 8,
        access_threshold: 2,
        max_staleness_frames: 2,
        max_bytes: 1 << 20,
        max_new_entries_per_frame: 4,
    }
}

#[test]
fn put_below_cost_threshold_is_rejected() {
    let mut cache = RasterCache::new(config());
    assert!(!cache.put(key(1), image(4), 7));
    assert!(cache.try_get(&key(1)).is_none());
    assert_eq!(cache.stats().rejections, 1);
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn put_then_get_hits_in_same_frame() {
    let mut cache = RasterCache::new(config());
    let img = image(4);
    assert!(cache.put(key(1), img.clone(), 8));
    let hit = cache.try_get(&key(1)).unwrap();
    assert_eq!(hit.unique_id(), img.unique_id());
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.bytes, 4 * 4 * 4);
}

#[test]
fn integer_translation_shares_an_entry() {
    let mut cache = RasterCache::new(config());
    let a = RasterCacheKey::new(
        LayerId(1),
        RasterCacheKeyKind::Picture,
        &Affine::translate((3.5, 2.0)),
    );
    let b = RasterCacheKey::new(
        LayerId(1),
        RasterCacheKeyKind::Picture,
        &Affine::translate((10.5, -4.0)),
    );
    let c = RasterCacheKey::new(
        LayerId(1),
        RasterCacheKeyKind::Picture,
        &Affine::translate((10.25, -4.0)),
    );
    cache.put(a, image(2), 100);
    assert!(cache.try_get(&b).is_some());
    assert!(cache.try_get(&c).is_none());
}

#[test]
fn kinds_do_not_alias() {
    let mut cache = RasterCache::new(config());
    cache.put(key(1), image(2), 100);
    let children =
        RasterCacheKey::new(LayerId(1), RasterCacheKeyKind::LayerChildren, &Affine::IDENTITY);
    assert!(cache.try_get(&children).is_none());
}

#[test]
fn changed_content_misses_the_old_image() {
    let mut cache = RasterCache::new(config());
    assert!(cache.put(key(1).with_content(1), image(4), 100));
    assert!(cache.contains(&key(1).with_content(1)));

    assert!(cache.try_get(&key(1).with_content(2)).is_none());
    assert!(!cache.contains(&key(1).with_content(2)));
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn seeing_new_content_evicts_and_restarts_the_access_count() {
    let mut cache = RasterCache::new(config());
    let old = key(1).with_content(1);
    cache.mark_seen(old);
    cache.sweep_after_frame();
    cache.mark_seen(old);
    assert!(cache.is_ready(&old));
    assert!(cache.put(old, image(4), 100));
    cache.sweep_after_frame();

    let new = key(1).with_content(2);
    cache.mark_seen(new);
    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.bytes, 0);
    assert_eq!(stats.evictions, 1);
    assert!(!cache.is_ready(&new), "count restarted at one");
    assert!(!cache.is_ready(&old));

    cache.sweep_after_frame();
    cache.mark_seen(new);
    assert!(cache.is_ready(&new));
}

#[test]
fn unused_entries_are_evicted_after_staleness_limit() {
    let mut cache = RasterCache::new(config());
    cache.put(key(1), image(4), 100);
    // The insert frame counts as a use.
    cache.sweep_after_frame();
    assert!(cache.contains(&key(1)));
    cache.sweep_after_frame();
    cache.sweep_after_frame();
    assert!(cache.contains(&key(1)));
    let report = cache.sweep_after_frame();
    assert_eq!(report.stale_evictions, 1);
    assert!(cache.try_get(&key(1)).is_none());
    assert_eq!(cache.stats().bytes, 0);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn access_resets_staleness() {
    let mut cache = RasterCache::new(config());
    cache.put(key(1), image(4), 100);
    for _ in 0..10 {
        cache.sweep_after_frame();
        assert!(cache.try_get(&key(1)).is_some());
    }
}

#[test]
fn readiness_needs_access_threshold_frames() {
    let mut cache = RasterCache::new(config());
    cache.mark_seen(key(1));
    cache.mark_seen(key(1));
    assert!(!cache.is_ready(&key(1)), "seen twice in one frame counts once");
    cache.sweep_after_frame();
    cache.mark_seen(key(1));
    assert!(cache.is_ready(&key(1)));
    cache.put(key(1), image(2), 100);
    assert!(!cache.is_ready(&key(1)), "already cached");
}

#[test]
fn per_frame_insert_cap() {
    let mut cache = RasterCache::new(RasterCacheConfig {
        max_new_entries_per_frame: 2,
        ..config()
    });
    assert!(cache.put(key(1), image(2), 100));
    assert!(cache.put(key(2), image(2), 100));
    assert!(!cache.put(key(3), image(2), 100));
    cache.sweep_after_frame();
    assert!(cache.put(key(3), image(2), 100));
}

#[test]
fn byte_budget_evicts_oldest_unused_first() {
    let mut cache = RasterCache::new(RasterCacheConfig {
        max_bytes: 2 * 16 * 16 * 4,
        max_staleness_frames: 100,
        ..config()
    });
    cache.put(key(1), image(16), 100);
    cache.sweep_after_frame();
    cache.put(key(2), image(16), 100);
    cache.sweep_after_frame();
    cache.put(key(3), image(16), 100);
    let report = cache.sweep_after_frame();
    assert_eq!(report.budget_evictions, 1);
    assert!(!cache.contains(&key(1)));
    assert!(cache.contains(&key(2)));
    assert!(cache.contains(&key(3)));
}

#[test]
fn oversized_image_is_rejected() {
    let mut cache = RasterCache::new(RasterCacheConfig {
        max_bytes: 100,
        ..config()
    });
    assert!(!cache.put(key(1), image(16), 100));
}

#[test]
fn clear_drops_everything() {
    let mut cache = RasterCache::new(config());
    cache.put(key(1), image(4), 100);
    cache.put(key(2), image(4), 100);
    cache.clear();
    assert_eq!(cache.stats().entries, 0);
    assert_eq!(cache.stats().bytes, 0);
    assert!(cache.try_get(&key(1)).is_none());
}
