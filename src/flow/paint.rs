use crate::{
    foundation::core::{Affine, ISize, LayerPaint, Point, Rect},
    geometry::{intersect_nonempty, intersects_nonempty, map_rect, round_out},
    image::PortableImage,
    layer::{LayerKind, LayerTree, NodeIndex, PictureLayer},
    paint::Canvas,
    render::RenderTargetFactory,
};

use super::{
    raster_cache::{RasterCache, RasterCacheKey, RasterCacheKeyKind},
    texture_registry::TextureRegistry,
};

/// Counters collected while painting one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PaintStats {
    pub layers_painted: usize,
    /// Layers skipped because they lie outside the cull rect.
    pub layers_culled: usize,
    /// Compositing scopes opened with `save_layer`.
    pub save_layers: usize,
    /// Compositing layers whose opacity was pushed down to their children.
    pub opacity_folded: usize,
    /// Layers drawn from a cached raster.
    pub cache_draws: usize,
    /// Rasterizations performed to fill the cache.
    pub cache_fills: usize,
    /// Texture layers without a published frame.
    pub missing_textures: usize,
}

/// Per-frame state of the paint pass.
pub struct PaintContext<'a> {
    canvas: &'a mut dyn Canvas,
    targets: &'a dyn RenderTargetFactory,
    raster_cache: Option<&'a mut RasterCache>,
    textures: Option<&'a TextureRegistry>,
    cull_rect: Rect,
    inherited_opacity: f32,
    stats: PaintStats,
}

impl<'a> PaintContext<'a> {
    /// Paint into `canvas`; raster cache fills allocate their targets from `targets`.
    pub fn new(canvas: &'a mut dyn Canvas, targets: &'a dyn RenderTargetFactory) -> Self {
        let cull_rect = canvas.size().to_rect();
        Self {
            canvas,
            targets,
            raster_cache: None,
            textures: None,
            cull_rect,
            inherited_opacity: 1.0,
            stats: PaintStats::default(),
        }
    }

    /// Draw cache candidates from, and rasterize them into, `cache`.
    pub fn with_raster_cache(mut self, cache: &'a mut RasterCache) -> Self {
        self.raster_cache = Some(cache);
        self
    }

    /// Resolve texture layers through `textures`.
    pub fn with_textures(mut self, textures: &'a TextureRegistry) -> Self {
        self.textures = Some(textures);
        self
    }

    /// Skip layers entirely outside `cull_rect` (device space).
    pub fn with_cull_rect(mut self, cull_rect: Rect) -> Self {
        self.cull_rect = cull_rect;
        self
    }

    pub fn stats(&self) -> PaintStats {
        self.stats
    }
}

/// Paint a prerolled tree.
///
/// Painting a tree that has not been prerolled is a contract violation; it asserts in
/// debug builds and paints nothing otherwise.
#[tracing::instrument(skip_all, fields(layers = tree.len()))]
pub fn paint_tree(tree: &LayerTree, ctx: &mut PaintContext<'_>) {
    debug_assert!(tree.is_prerolled(), "paint before preroll");
    if !tree.is_prerolled() {
        tracing::error!("layer tree painted before preroll; skipping");
        return;
    }
    paint_node(tree, tree.root(), ctx);
}

fn paint_node(tree: &LayerTree, idx: NodeIndex, ctx: &mut PaintContext<'_>) {
    let node = tree.node(idx);
    let device_bounds = map_rect(ctx.canvas.transform(), node.paint_bounds());
    if !intersects_nonempty(device_bounds, ctx.cull_rect) {
        ctx.stats.layers_culled += 1;
        return;
    }
    ctx.stats.layers_painted += 1;

    match node.kind() {
        LayerKind::Container => paint_children(tree, idx, ctx),
        LayerKind::Transform(t) => {
            ctx.canvas.save();
            ctx.canvas.concat(*t);
            paint_children(tree, idx, ctx);
            ctx.canvas.restore();
        }
        LayerKind::ClipRect(c) => {
            let outer_cull = ctx.cull_rect;
            ctx.cull_rect = intersect_nonempty(outer_cull, map_rect(ctx.canvas.transform(), *c));
            ctx.canvas.save();
            ctx.canvas.clip_rect(*c);
            paint_children(tree, idx, ctx);
            ctx.canvas.restore();
            ctx.cull_rect = outer_cull;
        }
        LayerKind::Picture(p) => {
            let paint = LayerPaint::with_opacity(ctx.inherited_opacity);
            if node.is_cache_candidate()
                && paint_cached(
                    tree,
                    idx,
                    RasterCacheKeyKind::Picture,
                    p.paint_bounds(),
                    paint,
                    ctx,
                )
            {
                return;
            }
            draw_picture(ctx.canvas, p, ctx.inherited_opacity);
        }
        LayerKind::Texture(t) => {
            let Some(frame) = ctx.textures.and_then(|r| r.get(t.texture_id)) else {
                tracing::trace!(texture_id = t.texture_id, "no frame published for texture");
                ctx.stats.missing_textures += 1;
                return;
            };
            let sx = t.rect.width() / f64::from(frame.width().max(1));
            let sy = t.rect.height() / f64::from(frame.height().max(1));
            ctx.canvas.save();
            ctx.canvas
                .concat(Affine::translate((t.rect.x0, t.rect.y0)) * Affine::scale_non_uniform(sx, sy));
            ctx.canvas.draw_image(
                &frame,
                Point::ZERO,
                LayerPaint::with_opacity(ctx.inherited_opacity),
            );
            ctx.canvas.restore();
        }
        LayerKind::Blend(b) => {
            if node.children().is_empty() {
                return;
            }
            ctx.canvas.save();
            ctx.canvas.translate(b.offset());
            let outer_opacity = ctx.inherited_opacity;
            if b.children_can_accept_opacity() {
                ctx.stats.opacity_folded += 1;
                ctx.inherited_opacity = outer_opacity * b.opacity();
                paint_children(tree, idx, ctx);
            } else {
                let paint = LayerPaint {
                    opacity: outer_opacity * b.opacity(),
                    blend: b.blend_mode(),
                };
                let local_bounds = node.paint_bounds() - b.offset();
                let cached = node.is_cache_candidate()
                    && paint_cached(
                        tree,
                        idx,
                        RasterCacheKeyKind::LayerChildren,
                        local_bounds,
                        paint,
                        ctx,
                    );
                if !cached {
                    ctx.stats.save_layers += 1;
                    ctx.canvas.save_layer(Some(local_bounds), paint);
                    ctx.inherited_opacity = 1.0;
                    paint_children(tree, idx, ctx);
                    ctx.canvas.restore();
                }
            }
            ctx.inherited_opacity = outer_opacity;
            ctx.canvas.restore();
        }
    }
}

fn paint_children(tree: &LayerTree, idx: NodeIndex, ctx: &mut PaintContext<'_>) {
    for &child in tree.node(idx).children() {
        paint_node(tree, child, ctx);
    }
}

fn draw_picture(canvas: &mut dyn Canvas, picture: &PictureLayer, opacity: f32) {
    canvas.save();
    canvas.translate(picture.offset);
    canvas.draw_display_list(&picture.display_list, opacity);
    canvas.restore();
}

/// Draw the layer from the raster cache, rasterizing it first when the cache is ready for
/// it. Returns `false` when the caller has to paint the layer itself.
fn paint_cached(
    tree: &LayerTree,
    idx: NodeIndex,
    kind: RasterCacheKeyKind,
    local_bounds: Rect,
    paint: LayerPaint,
    ctx: &mut PaintContext<'_>,
) -> bool {
    let Some(cache) = ctx.raster_cache.as_deref_mut() else {
        return false;
    };
    let node = tree.node(idx);
    let ctm = ctx.canvas.transform();
    let device = round_out(map_rect(ctm, local_bounds));
    if device.width() <= 0.0 || device.height() <= 0.0 {
        return false;
    }
    let key = RasterCacheKey::new(node.id(), kind, &ctm).with_content(node.generation());

    let image = match cache.try_get(&key) {
        Some(image) => image,
        None => {
            if !cache.is_ready(&key) {
                return false;
            }
            let Some(image) = rasterize(tree, idx, kind, ctm, device, ctx.targets, ctx.textures)
            else {
                return false;
            };
            ctx.stats.cache_fills += 1;
            cache.put(key, image.clone(), node.preroll.raster_cost);
            image
        }
    };

    // The cached raster is pixel-aligned in device space.
    ctx.canvas.save();
    ctx.canvas.set_transform(Affine::translate((device.x0, device.y0)));
    ctx.canvas.draw_image(&image, Point::ZERO, paint);
    ctx.canvas.restore();
    ctx.stats.cache_draws += 1;
    true
}

fn rasterize(
    tree: &LayerTree,
    idx: NodeIndex,
    kind: RasterCacheKeyKind,
    ctm: Affine,
    device: Rect,
    targets: &dyn RenderTargetFactory,
    textures: Option<&TextureRegistry>,
) -> Option<PortableImage> {
    let size = ISize::new(device.width() as u32, device.height() as u32);
    let Some(mut target) = targets.make_render_target(size) else {
        tracing::warn!(
            width = size.width,
            height = size.height,
            "raster cache could not allocate a render target"
        );
        return None;
    };

    {
        let canvas = target.canvas();
        canvas.set_transform(Affine::translate((-device.x0, -device.y0)) * ctm);
        match (kind, tree.node(idx).kind()) {
            (RasterCacheKeyKind::Picture, LayerKind::Picture(p)) => draw_picture(canvas, p, 1.0),
            (RasterCacheKeyKind::LayerChildren, _) => {
                let mut inner = PaintContext::new(canvas, targets);
                if let Some(textures) = textures {
                    inner = inner.with_textures(textures);
                }
                paint_children(tree, idx, &mut inner);
            }
            _ => return None,
        }
        canvas.flush();
    }
    target.snapshot()
}

#[cfg(test)]
#[path = "../../tests/unit/flow/paint.rs"]
mod tests;
