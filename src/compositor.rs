//! Frame pipeline: validate, diff, preroll, paint, sweep.

use std::sync::Mutex;

use crate::{
    config::{CompositorConfig, EngineConfig, ValidationPolicy},
    flow::{
        PaintContext, PaintStats, PrerollContext, RasterCache, RasterCacheStats, SweepReport,
        TextureRegistry, diff_trees_with_root, paint_tree, preroll_tree,
    },
    foundation::{
        core::{Affine, Rect},
        error::{LaminateError, LaminateResult},
    },
    geometry::{DamageRegion, align_out},
    layer::LayerTree,
    render::{RenderTargetFactory, Surface, cpu::CpuRasterFactory},
};

/// What happened while drawing one frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct FrameReport {
    /// Frame counter, starting at 0.
    pub frame_number: u64,
    /// Damage reported by the diff pass.
    pub damage: DamageRegion,
    pub full_frame: bool,
    /// Device rect actually repainted, `None` for a full repaint.
    pub repaint_rect: Option<Rect>,
    /// `false` when painting was skipped (no damage) or the surface had no frame to give.
    pub presented: bool,
    pub layers: usize,
    pub layers_reused: usize,
    pub paint: PaintStats,
    pub sweep: SweepReport,
    pub raster_cache: RasterCacheStats,
}

/// Owns the per-surface frame state: the retained tree, the raster cache, and the texture
/// registry consulted by texture layers.
///
/// A compositor draws into one surface. Call [`reset`] before pointing it at another one,
/// or after the backend context was lost.
///
/// [`reset`]: Compositor::reset
#[derive(Debug)]
pub struct Compositor {
    config: CompositorConfig,
    raster_cache: RasterCache,
    textures: TextureRegistry,
    retained: Option<LayerTree>,
    /// Root transformation the retained tree's paint regions were computed under.
    retained_root: Affine,
    frame_number: u64,
    cpu_targets: CpuRasterFactory,
}

impl Compositor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.compositor.clone(),
            raster_cache: RasterCache::new(config.raster_cache.clone()),
            textures: TextureRegistry::new(),
            retained: None,
            retained_root: Affine::IDENTITY,
            frame_number: 0,
            cpu_targets: CpuRasterFactory::new(),
        }
    }

    /// Resolve texture layers through a registry shared with texture producers.
    pub fn with_textures(mut self, textures: TextureRegistry) -> Self {
        self.textures = textures;
        self
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn raster_cache(&self) -> &RasterCache {
        &self.raster_cache
    }

    /// Tree drawn by the last presented frame.
    pub fn retained_tree(&self) -> Option<&LayerTree> {
        self.retained.as_ref()
    }

    /// Forget the retained tree and cached rasters. The next frame is fully repainted.
    pub fn reset(&mut self) {
        self.retained = None;
        self.raster_cache.clear();
    }

    /// Draw `tree` into `surface` and retain it for the next frame's diff.
    ///
    /// Fails when the tree does not match the surface size, when the surface is invalid,
    /// or (with [`ValidationPolicy::Always`]) when the tree contains a compositing layer
    /// without children. A surface that cannot hand out a frame is not an error; the
    /// report says `presented: false` and the next frame is fully repainted.
    #[tracing::instrument(skip_all, fields(frame = self.frame_number, layers = tree.len()))]
    pub fn draw_frame(
        &mut self,
        mut tree: LayerTree,
        surface: &mut dyn Surface,
    ) -> LaminateResult<FrameReport> {
        if !surface.is_valid() {
            tracing::error!("surface is no longer valid; dropping retained state");
            self.reset();
            return Err(LaminateError::backend("surface is not valid"));
        }
        if self.config.validation == ValidationPolicy::Always {
            tree.validate()?;
        }
        let size = surface.size();
        if tree.frame_size() != size {
            return Err(LaminateError::validation(format!(
                "layer tree is {}x{} but the surface is {}x{}",
                tree.frame_size().width,
                tree.frame_size().height,
                size.width,
                size.height
            )));
        }

        let frame_number = self.frame_number;
        self.frame_number += 1;
        let frame_rect = size.to_rect();
        let root_transform = surface.root_transformation();

        // Retained regions are device rects; a new root transformation invalidates them.
        let old = self
            .retained
            .as_ref()
            .filter(|_| self.retained_root == root_transform);
        let diff = diff_trees_with_root(old, &mut tree, root_transform);
        self.retained_root = root_transform;
        {
            let mut ctx = PrerollContext::new(frame_rect, root_transform)
                .with_raster_cache(&mut self.raster_cache)
                .with_validation(self.config.validation);
            preroll_tree(&mut tree, &mut ctx);
        }

        let mut report = FrameReport {
            frame_number,
            damage: diff.damage.clone(),
            full_frame: diff.full_frame,
            layers: tree.len(),
            layers_reused: diff.subtrees_reused,
            ..FrameReport::default()
        };

        if !diff.full_frame && diff.damage.is_empty() {
            tracing::debug!("no damage; frame skipped");
            report.sweep = self.raster_cache.sweep_after_frame();
            report.raster_cache = self.raster_cache.stats();
            self.retained = Some(tree);
            return Ok(report);
        }

        let repaint_rect = match diff.damage.bounds() {
            Some(bounds) if self.config.partial_repaint && !diff.full_frame => Some(align_out(
                bounds,
                self.config.damage_alignment,
                frame_rect,
            )),
            _ => None,
        };

        let context = surface.context();
        let targets: &dyn RenderTargetFactory = match &context {
            Some(c) => c.as_ref(),
            None => &self.cpu_targets,
        };
        let presented = match surface.acquire_frame(repaint_rect) {
            Some(mut frame) => {
                let canvas = frame.canvas();
                canvas.save();
                if let Some(clip) = repaint_rect {
                    canvas.clip_rect(clip);
                }
                canvas.concat(root_transform);
                let mut ctx = PaintContext::new(canvas, targets)
                    .with_raster_cache(&mut self.raster_cache)
                    .with_textures(&self.textures)
                    .with_cull_rect(repaint_rect.unwrap_or(frame_rect));
                paint_tree(&tree, &mut ctx);
                report.paint = ctx.stats();
                canvas.restore();
                canvas.flush();
                frame.submit()
            }
            None => false,
        };

        report.repaint_rect = repaint_rect;
        report.presented = presented;
        report.sweep = self.raster_cache.sweep_after_frame();
        report.raster_cache = self.raster_cache.stats();
        if presented {
            self.retained = Some(tree);
        } else {
            tracing::warn!("surface did not present the frame; next frame repaints fully");
            self.retained = None;
        }
        Ok(report)
    }
}

/// Single-slot mailbox handing finished trees from the building thread to the raster
/// thread. A newer tree replaces one that was never picked up.
#[derive(Debug, Default)]
pub struct LayerTreeHolder {
    slot: Mutex<Option<LayerTree>>,
}

impl LayerTreeHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `tree`. Returns `true` when it replaced an unconsumed tree.
    pub fn push(&self, tree: LayerTree) -> bool {
        match self.slot.lock() {
            Ok(mut slot) => slot.replace(tree).is_some(),
            Err(poisoned) => poisoned.into_inner().replace(tree).is_some(),
        }
    }

    /// Take the latest tree, if any.
    pub fn pop(&self) -> Option<LayerTree> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().map(|s| s.is_none()).unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "../tests/unit/compositor.rs"]
mod tests;
