use std::collections::HashMap;

use crate::{
    config::RasterCacheConfig,
    foundation::core::Affine,
    geometry::TransformClass,
    image::PortableImage,
    layer::LayerId,
};

/// What a cache entry holds for its layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterCacheKeyKind {
    /// A picture layer's display list.
    Picture,
    /// The composited children of a container (used by blend layers).
    LayerChildren,
}

/// Raster cache key: layer identity, content kind, device transform class, and the
/// generation of the content.
///
/// Entries are slotted by identity, kind and class. A key whose `content` differs from the
/// slot's evicts the slot's image and restarts its access count, so a layer that keeps its
/// id but changes what it draws is never served a stale raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterCacheKey {
    /// Layer identity.
    pub id: LayerId,
    /// Cached content.
    pub kind: RasterCacheKeyKind,
    /// Device transform class the content was rasterized under.
    pub class: TransformClass,
    /// Generation marker of the layer subtree the content comes from.
    pub content: u64,
}

impl RasterCacheKey {
    /// Key for `id` rasterized under device transform `ctm`, with content generation 0.
    pub fn new(id: LayerId, kind: RasterCacheKeyKind, ctm: &Affine) -> Self {
        Self {
            id,
            kind,
            class: TransformClass::of(ctm),
            content: 0,
        }
    }

    /// Same key for content of generation `content`.
    pub fn with_content(mut self, content: u64) -> Self {
        self.content = content;
        self
    }

    fn slot(&self) -> Slot {
        (self.id, self.kind, self.class)
    }
}

type Slot = (LayerId, RasterCacheKeyKind, TransformClass);

/// Cumulative counters plus current occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RasterCacheStats {
    /// Entries currently holding an image.
    pub entries: usize,
    /// Bytes held by cached images.
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// `put` calls refused by the cost threshold, the per-frame cap, or the byte budget.
    pub rejections: u64,
    pub evictions: u64,
}

/// Result of one end-of-frame sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Entries evicted for staleness.
    pub stale_evictions: usize,
    /// Entries evicted to get back under the byte budget.
    pub budget_evictions: usize,
}

#[derive(Clone, Debug, Default)]
struct Entry {
    content: u64,
    image: Option<PortableImage>,
    /// Frames in which the key was seen by preroll.
    access_count: u32,
    used_this_frame: bool,
    stale_frames: u32,
    last_used_frame: u64,
}

/// Keyed store of rasterized layer content.
///
/// Preroll reports candidates with [`mark_seen`]; once a key has been seen on
/// `access_threshold` frames it becomes [`ready`] and paint rasterizes it with [`put`].
/// Lookups go through [`try_get`]. [`sweep_after_frame`] ages and evicts entries once per
/// frame.
///
/// The cache owns its images outright. Layers never hold references to entries between
/// frames.
///
/// [`mark_seen`]: RasterCache::mark_seen
/// [`ready`]: RasterCache::is_ready
/// [`put`]: RasterCache::put
/// [`try_get`]: RasterCache::try_get
/// [`sweep_after_frame`]: RasterCache::sweep_after_frame
#[derive(Debug)]
pub struct RasterCache {
    config: RasterCacheConfig,
    entries: HashMap<Slot, Entry>,
    frame: u64,
    bytes: usize,
    inserted_this_frame: usize,
    stats: RasterCacheStats,
}

impl RasterCache {
    pub fn new(config: RasterCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            frame: 0,
            bytes: 0,
            inserted_this_frame: 0,
            stats: RasterCacheStats::default(),
        }
    }

    pub fn config(&self) -> &RasterCacheConfig {
        &self.config
    }

    /// Record that `key` is a caching candidate this frame. Counted once per frame.
    pub fn mark_seen(&mut self, key: RasterCacheKey) {
        let frame = self.frame;
        let entry = self.entries.entry(key.slot()).or_default();
        if entry.content != key.content {
            if let Some(old) = entry.image.take() {
                tracing::debug!(id = %key.id, "raster cache evict changed content");
                self.bytes -= old.byte_size();
                self.stats.evictions += 1;
            }
            entry.content = key.content;
            entry.access_count = 0;
            entry.used_this_frame = false;
        }
        if !entry.used_this_frame {
            entry.access_count = entry.access_count.saturating_add(1);
        }
        entry.used_this_frame = true;
        entry.last_used_frame = frame;
    }

    /// Return `true` when `key` has been seen often enough to be worth rasterizing and has
    /// no image yet.
    pub fn is_ready(&self, key: &RasterCacheKey) -> bool {
        self.entries.get(&key.slot()).is_some_and(|e| {
            e.content == key.content
                && e.image.is_none()
                && e.access_count >= self.config.access_threshold
                && self.inserted_this_frame < self.config.max_new_entries_per_frame
        })
    }

    /// Cached image for `key`, counting a hit or miss. An image rasterized from other
    /// content is a miss.
    pub fn try_get(&mut self, key: &RasterCacheKey) -> Option<PortableImage> {
        let frame = self.frame;
        match self.entries.get_mut(&key.slot()) {
            Some(Entry {
                content,
                image: Some(image),
                used_this_frame,
                last_used_frame,
                ..
            }) if *content == key.content => {
                *used_this_frame = true;
                *last_used_frame = frame;
                self.stats.hits += 1;
                Some(image.clone())
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store `image` for `key`. `cost` is the display-list complexity of the content.
    ///
    /// Returns `false` (and stores nothing) when the content is cheaper than the cost
    /// threshold, this frame's insert cap is spent, or the image alone exceeds the byte
    /// budget.
    pub fn put(&mut self, key: RasterCacheKey, image: PortableImage, cost: u64) -> bool {
        if cost < self.config.cost_threshold {
            tracing::debug!(id = %key.id, cost, "raster cache rejected cheap content");
            self.stats.rejections += 1;
            return false;
        }
        if self.inserted_this_frame >= self.config.max_new_entries_per_frame {
            tracing::debug!(id = %key.id, "raster cache insert cap reached for this frame");
            self.stats.rejections += 1;
            return false;
        }
        let size = image.byte_size();
        if size > self.config.max_bytes {
            tracing::debug!(id = %key.id, size, "raster cache rejected oversized image");
            self.stats.rejections += 1;
            return false;
        }

        let frame = self.frame;
        let entry = self.entries.entry(key.slot()).or_default();
        if entry.content != key.content {
            entry.content = key.content;
            entry.access_count = 0;
        }
        if let Some(old) = entry.image.replace(image) {
            self.bytes -= old.byte_size();
        }
        entry.used_this_frame = true;
        entry.last_used_frame = frame;
        self.bytes += size;
        self.inserted_this_frame += 1;
        self.stats.inserts += 1;
        tracing::debug!(id = %key.id, kind = ?key.kind, size, "raster cache insert");
        true
    }

    /// Return `true` when `key` currently holds an image. Does not count as an access.
    pub fn contains(&self, key: &RasterCacheKey) -> bool {
        self.entries
            .get(&key.slot())
            .is_some_and(|e| e.content == key.content && e.image.is_some())
    }

    /// Age unused entries and evict stale ones, then enforce the byte budget.
    pub fn sweep_after_frame(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        let max_staleness = self.config.max_staleness_frames;

        for entry in self.entries.values_mut() {
            if entry.used_this_frame {
                entry.stale_frames = 0;
            } else {
                entry.stale_frames = entry.stale_frames.saturating_add(1);
            }
            entry.used_this_frame = false;
        }

        let mut freed = 0usize;
        self.entries.retain(|(id, _, _), e| {
            if e.stale_frames <= max_staleness {
                return true;
            }
            if let Some(image) = &e.image {
                tracing::debug!(id = %id, stale = e.stale_frames, "raster cache evict stale");
                freed += image.byte_size();
                report.stale_evictions += 1;
            }
            false
        });
        self.bytes -= freed;

        if self.bytes > self.config.max_bytes {
            let mut victims: Vec<(u64, Slot)> = self
                .entries
                .iter()
                .filter(|(_, e)| e.image.is_some())
                .map(|(k, e)| (e.last_used_frame, *k))
                .collect();
            victims.sort_by_key(|(last_used, _)| *last_used);
            for (_, slot) in victims {
                if self.bytes <= self.config.max_bytes {
                    break;
                }
                if let Some(image) = self.entries.get_mut(&slot).and_then(|e| e.image.take()) {
                    tracing::debug!(id = %slot.0, "raster cache evict over budget");
                    self.bytes -= image.byte_size();
                    report.budget_evictions += 1;
                }
            }
        }

        self.stats.evictions += (report.stale_evictions + report.budget_evictions) as u64;
        self.inserted_this_frame = 0;
        self.frame += 1;
        report
    }

    /// Drop every entry, e.g. after the backend context was lost.
    pub fn clear(&mut self) {
        let n = self.entries.values().filter(|e| e.image.is_some()).count();
        self.stats.evictions += n as u64;
        self.entries.clear();
        self.bytes = 0;
        self.inserted_this_frame = 0;
    }

    /// Counters and occupancy.
    pub fn stats(&self) -> RasterCacheStats {
        RasterCacheStats {
            entries: self.entries.values().filter(|e| e.image.is_some()).count(),
            bytes: self.bytes,
            ..self.stats
        }
    }
}

impl Default for RasterCache {
    fn default() -> Self {
        Self::new(RasterCacheConfig::default())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/flow/raster_cache.rs"]
mod tests;
