use smallvec::SmallVec;

use crate::{
    config::{RasterCacheConfig, ValidationPolicy},
    foundation::core::{Affine, Rect},
    geometry::{intersect_nonempty, intersects_nonempty, map_rect, union_nonempty},
    layer::{LayerId, LayerKind, LayerTree, NodeIndex, PrerollState},
};

use super::raster_cache::{RasterCache, RasterCacheKey, RasterCacheKeyKind};

/// Per-frame state of the preroll pass: cull rect, transform stack, and the raster cache
/// that collects caching candidates.
#[derive(Debug)]
pub struct PrerollContext<'a> {
    transforms: Vec<Affine>,
    culls: Vec<Rect>,
    raster_cache: Option<&'a mut RasterCache>,
    cost_threshold: u64,
    check_empty_compositing: bool,
    cache_candidates: usize,
}

impl<'a> PrerollContext<'a> {
    /// Context culling against `cull_rect` (device space), starting at `root_transform`.
    pub fn new(cull_rect: Rect, root_transform: Affine) -> Self {
        Self {
            transforms: vec![root_transform],
            culls: vec![cull_rect],
            raster_cache: None,
            cost_threshold: RasterCacheConfig::default().cost_threshold,
            check_empty_compositing: true,
            cache_candidates: 0,
        }
    }

    /// Report caching candidates to `cache`.
    pub fn with_raster_cache(mut self, cache: &'a mut RasterCache) -> Self {
        self.cost_threshold = cache.config().cost_threshold;
        self.raster_cache = Some(cache);
        self
    }

    /// Control the debug assertion on compositing layers without children.
    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.check_empty_compositing = policy != ValidationPolicy::Never;
        self
    }

    /// Current layer-to-device transform.
    pub fn transform(&self) -> Affine {
        self.transforms.last().copied().unwrap_or(Affine::IDENTITY)
    }

    /// Current device-space cull rect.
    pub fn cull_rect(&self) -> Rect {
        self.culls.last().copied().unwrap_or(Rect::ZERO)
    }

    /// Caching candidates reported so far.
    pub fn cache_candidates(&self) -> usize {
        self.cache_candidates
    }

    fn is_visible(&self, bounds: Rect) -> bool {
        intersects_nonempty(map_rect(self.transform(), bounds), self.cull_rect())
    }

    fn mark_candidate(
        &mut self,
        id: LayerId,
        generation: u64,
        kind: RasterCacheKeyKind,
        ctm: Affine,
    ) -> bool {
        let Some(cache) = self.raster_cache.as_deref_mut() else {
            return false;
        };
        cache.mark_seen(RasterCacheKey::new(id, kind, &ctm).with_content(generation));
        self.cache_candidates += 1;
        true
    }
}

/// Compute paint bounds, opacity capabilities, and cache candidacy for every layer.
///
/// Children are prerolled before their parent reads their results, so each compositing
/// layer decides from its children's final flags.
#[tracing::instrument(skip_all, fields(layers = tree.len()))]
pub fn preroll_tree(tree: &mut LayerTree, ctx: &mut PrerollContext<'_>) {
    let root = tree.root();
    preroll_node(tree, root, ctx);
    tree.mark_prerolled();
}

fn preroll_node(tree: &mut LayerTree, idx: NodeIndex, ctx: &mut PrerollContext<'_>) {
    let node = tree.node(idx);
    let id = node.id();
    let generation = node.generation();
    let kind = node.kind().clone();
    let children: SmallVec<[NodeIndex; 4]> = SmallVec::from_slice(node.children());

    let state = match &kind {
        LayerKind::Picture(p) => {
            let bounds = p.paint_bounds();
            let cost = p.display_list.cost();
            let raster_cost = if p.is_complex {
                cost.max(ctx.cost_threshold)
            } else {
                cost
            };
            let ctm = ctx.transform();
            let cache_candidate = raster_cost >= ctx.cost_threshold
                && !p.will_change
                && ctx.is_visible(bounds)
                && ctx.mark_candidate(id, generation, RasterCacheKeyKind::Picture, ctm);
            PrerollState {
                paint_bounds: bounds,
                subtree_can_inherit_opacity: p.display_list.can_apply_group_opacity(),
                child_opacity_flags: SmallVec::new(),
                has_texture_layer: false,
                cache_candidate,
                raster_cost,
            }
        }
        LayerKind::Texture(t) => PrerollState {
            paint_bounds: t.rect,
            subtree_can_inherit_opacity: true,
            child_opacity_flags: SmallVec::new(),
            has_texture_layer: true,
            cache_candidate: false,
            raster_cost: 0,
        },
        container => {
            if container.is_compositing() && ctx.check_empty_compositing {
                debug_assert!(
                    !children.is_empty(),
                    "compositing layer {id} has no children"
                );
            }
            let ctm = ctx.transform();
            let child_ctm = ctm * container.child_transform();
            let cull = match container {
                LayerKind::ClipRect(c) => intersect_nonempty(ctx.cull_rect(), map_rect(ctm, *c)),
                _ => ctx.cull_rect(),
            };

            ctx.transforms.push(child_ctm);
            ctx.culls.push(cull);
            let mut child_bounds = Rect::ZERO;
            let mut flags = SmallVec::<[bool; 4]>::new();
            let mut has_texture_layer = false;
            let mut raster_cost = 0u64;
            for &child in &children {
                preroll_node(tree, child, ctx);
                let cs = &tree.node(child).preroll;
                // Overlapping siblings would blend into each other under per-child opacity.
                flags.push(
                    cs.subtree_can_inherit_opacity
                        && !intersects_nonempty(child_bounds, cs.paint_bounds),
                );
                child_bounds = union_nonempty(child_bounds, cs.paint_bounds);
                has_texture_layer |= cs.has_texture_layer;
                raster_cost = raster_cost.saturating_add(cs.raster_cost);
            }
            ctx.culls.pop();
            ctx.transforms.pop();

            let all_accept = flags.iter().all(|&f| f);
            let (paint_bounds, subtree_can_inherit_opacity) = match container {
                LayerKind::Transform(t) => (map_rect(*t, child_bounds), all_accept),
                LayerKind::ClipRect(c) => (intersect_nonempty(child_bounds, *c), all_accept),
                LayerKind::Blend(b) => (
                    map_rect(Affine::translate(b.offset()), child_bounds),
                    b.blend_mode().is_default(),
                ),
                _ => (child_bounds, all_accept),
            };

            let mut cache_candidate = false;
            if let LayerKind::Blend(b) = container {
                let accept = all_accept && !children.is_empty();
                let folds_opacity = accept && b.blend_mode().is_default();
                if let LayerKind::Blend(stored) = &mut tree.node_mut(idx).kind {
                    stored.set_children_can_accept_opacity(accept);
                }
                cache_candidate = !folds_opacity
                    && !children.is_empty()
                    && !has_texture_layer
                    && raster_cost >= ctx.cost_threshold
                    && ctx.is_visible(paint_bounds)
                    && ctx.mark_candidate(
                        id,
                        generation,
                        RasterCacheKeyKind::LayerChildren,
                        child_ctm,
                    );
            }

            PrerollState {
                paint_bounds,
                subtree_can_inherit_opacity,
                child_opacity_flags: flags,
                has_texture_layer,
                cache_candidate,
                raster_cost,
            }
        }
    };

    tree.node_mut(idx).preroll = state;
}

#[cfg(test)]
#[path = "../../tests/unit/flow/preroll.rs"]
mod tests;
