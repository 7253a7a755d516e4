//! Engine configuration.
//!
//! Every section deserializes with defaults, so a partial JSON document (or none at all) is
//! a valid configuration. `LAMINATE_*` environment variables override individual values.

use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{LaminateError, LaminateResult};

/// Raster cache tuning.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RasterCacheConfig {
    /// Minimum display-list cost for content to be worth caching.
    pub cost_threshold: u64,
    /// Frames a candidate must be seen before it is rasterized into the cache.
    pub access_threshold: u32,
    /// Frames an entry may go unused before it is evicted.
    pub max_staleness_frames: u32,
    /// Upper bound on cached pixel memory.
    pub max_bytes: usize,
    /// Upper bound on rasterizations per frame.
    pub max_new_entries_per_frame: usize,
}

impl Default for RasterCacheConfig {
    fn default() -> Self {
        Self {
            cost_threshold: 8,
            access_threshold: 3,
            max_staleness_frames: 2,
            max_bytes: 64 * 1024 * 1024,
            max_new_entries_per_frame: 3,
        }
    }
}

/// When the empty-compositing-layer precondition is checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Assert during preroll in debug builds only.
    #[default]
    DebugOnly,
    /// Reject offending trees with a validation error before preroll, in every build.
    Always,
    /// Never check.
    Never,
}

/// Frame pipeline behavior.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Restrict painting to the damaged area when the previous frame is retained.
    pub partial_repaint: bool,
    /// Damage is expanded to multiples of this many pixels.
    pub damage_alignment: u32,
    /// Empty compositing layer checking.
    pub validation: ValidationPolicy,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            partial_repaint: true,
            damage_alignment: 1,
            validation: ValidationPolicy::DebugOnly,
        }
    }
}

/// Snapshot pipeline behavior.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Start with GPU snapshots disabled (software path only).
    pub gpu_disabled_at_startup: bool,
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Raster cache tuning.
    pub raster_cache: RasterCacheConfig,
    /// Frame pipeline behavior.
    pub compositor: CompositorConfig,
    /// Snapshot pipeline behavior.
    pub snapshot: SnapshotConfig,
}

impl EngineConfig {
    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> LaminateResult<Self> {
        serde_json::from_str(s).map_err(|e| LaminateError::serde(e.to_string()))
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: &Path) -> LaminateResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> LaminateResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| LaminateError::serde(e.to_string()))
    }

    /// Apply `LAMINATE_*` environment overrides. Unparsable or out-of-range values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let rc = &mut self.raster_cache;
        rc.cost_threshold = var("LAMINATE_RASTER_CACHE_COST_THRESHOLD")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(rc.cost_threshold);
        rc.access_threshold = var("LAMINATE_RASTER_CACHE_ACCESS_THRESHOLD")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(rc.access_threshold);
        rc.max_staleness_frames = var("LAMINATE_RASTER_CACHE_MAX_STALENESS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(rc.max_staleness_frames);
        rc.max_bytes = var("LAMINATE_RASTER_CACHE_MAX_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(rc.max_bytes);

        let comp = &mut self.compositor;
        comp.partial_repaint = var("LAMINATE_PARTIAL_REPAINT")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(comp.partial_repaint);
        comp.damage_alignment = var("LAMINATE_DAMAGE_ALIGNMENT")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(comp.damage_alignment);
        comp.validation = var("LAMINATE_VALIDATION")
            .and_then(|v| match v.as_str() {
                "debug_only" => Some(ValidationPolicy::DebugOnly),
                "always" => Some(ValidationPolicy::Always),
                "never" => Some(ValidationPolicy::Never),
                _ => None,
            })
            .unwrap_or(comp.validation);

        self.snapshot.gpu_disabled_at_startup = var("LAMINATE_GPU_DISABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(self.snapshot.gpu_disabled_at_startup);
        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> LaminateResult<()> {
        if self.raster_cache.max_staleness_frames == 0 {
            return Err(LaminateError::validation(
                "raster_cache.max_staleness_frames must be > 0",
            ));
        }
        if self.compositor.damage_alignment == 0 {
            return Err(LaminateError::validation(
                "compositor.damage_alignment must be > 0",
            ));
        }
        if self.raster_cache.max_new_entries_per_frame == 0 && self.raster_cache.max_bytes > 0 {
            return Err(LaminateError::validation(
                "raster_cache.max_new_entries_per_frame must be > 0 when the cache has a byte budget",
            ));
        }
        Ok(())
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
