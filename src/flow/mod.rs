//! Per-frame passes over a layer tree: diff, preroll, and paint, plus the raster cache
//! they share.
//!
//! The passes run in that fixed order on one thread per frame. Diff compares the new tree
//! against the retained previous tree and produces device-space damage. Preroll computes
//! paint bounds and capability flags. Paint walks the tree against a [`Canvas`], consulting
//! the [`RasterCache`] before recursing into cacheable subtrees.
//!
//! [`Canvas`]: crate::paint::Canvas

mod diff;
mod paint;
mod preroll;
mod raster_cache;
mod texture_registry;

pub use diff::{DiffContext, DiffResult, diff_trees, diff_trees_with_root};
pub use paint::{PaintContext, PaintStats, paint_tree};
pub use preroll::{PrerollContext, preroll_tree};
pub use raster_cache::{
    RasterCache, RasterCacheKey, RasterCacheKeyKind, RasterCacheStats, SweepReport,
};
pub use texture_registry::TextureRegistry;
