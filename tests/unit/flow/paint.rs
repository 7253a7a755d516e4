use super::*;
use crate::{
    config::RasterCacheConfig,
    flow::{PrerollContext, preroll_tree},
    foundation::core::{BlendMode, Rgba8, Vec2},
    layer::{LayerId, LayerTreeBuilder, TextureLayer},
    paint::{CanvasOp, DisplayListBuilder, RecordingCanvas},
    render::{RenderTarget, cpu::{CpuRasterFactory, CpuRenderTarget}},
};

const SIZE: ISize = ISize::new(64, 64);

fn strip(y: f64, count: usize, color: Rgba8) -> PictureLayer {
    let mut b = DisplayListBuilder::new();
    for i in 0..count {
        let x = 4.0 * i as f64;
        b.fill_rect(Rect::new(x, y, x + 3.0, y + 3.0), color);
    }
    PictureLayer::new(b.build(), Vec2::ZERO)
}

fn blend_tree(alpha: u8, mode: BlendMode) -> LayerTree {
    let mut b = LayerTreeBuilder::new(SIZE);
    b.push_blend(LayerId(1), alpha, Vec2::new(2.0, 0.0), mode)
        .unwrap()
        .add_picture(LayerId(2), strip(0.0, 2, Rgba8::opaque(255, 0, 0)))
        .unwrap()
        .add_picture(LayerId(3), strip(10.0, 2, Rgba8::opaque(0, 0, 255)))
        .unwrap()
        .pop()
        .unwrap();
    b.build().unwrap()
}

fn preroll(tree: &mut LayerTree, cache: Option<&mut RasterCache>) {
    let mut ctx = PrerollContext::new(SIZE.to_rect(), Affine::IDENTITY);
    if let Some(cache) = cache {
        ctx = ctx.with_raster_cache(cache);
    }
    preroll_tree(tree, &mut ctx);
}

fn record(tree: &LayerTree, cache: Option<&mut RasterCache>) -> (Vec<CanvasOp>, PaintStats) {
    let mut canvas = RecordingCanvas::new(SIZE);
    let factory = CpuRasterFactory::new();
    let mut ctx = PaintContext::new(&mut canvas, &factory);
    if let Some(cache) = cache {
        ctx = ctx.with_raster_cache(cache);
    }
    paint_tree(tree, &mut ctx);
    let stats = ctx.stats();
    assert_eq!(canvas.save_count(), 0, "unbalanced save/restore");
    (canvas.ops().to_vec(), stats)
}

#[test]
fn accepting_children_fold_opacity_without_a_scope() {
    let mut tree = blend_tree(51, BlendMode::SrcOver);
    preroll(&mut tree, None);
    let (ops, stats) = record(&tree, None);

    assert_eq!(stats.save_layers, 0);
    assert_eq!(stats.opacity_folded, 1);
    let opacities: Vec<f32> = ops
        .iter()
        .filter_map(|op| match op {
            CanvasOp::DrawDisplayList { opacity, .. } => Some(*opacity),
            _ => None,
        })
        .collect();
    assert_eq!(opacities.len(), 2);
    for o in opacities {
        assert!((o - 0.2).abs() < 1e-6, "{o}");
    }
}

#[test]
fn non_default_blend_opens_a_scope() {
    let mut tree = blend_tree(128, BlendMode::Multiply);
    preroll(&mut tree, None);
    let (ops, stats) = record(&tree, None);

    assert_eq!(stats.save_layers, 1);
    let layer = ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::SaveLayer {
                paint, transform, ..
            } => Some((*paint, *transform)),
            _ => None,
        })
        .unwrap();
    assert_eq!(layer.0.blend, BlendMode::Multiply);
    assert!((layer.0.opacity - 128.0 / 255.0).abs() < 1e-6);
    assert_eq!(layer.1, Affine::translate((2.0, 0.0)));
    assert!(ops.contains(&CanvasOp::RestoreLayer));
    // Children inside the scope draw fully opaque.
    assert!(ops.iter().all(|op| match op {
        CanvasOp::DrawDisplayList { opacity, .. } => *opacity == 1.0,
        _ => true,
    }));
}

#[test]
fn layers_outside_the_cull_rect_are_skipped() {
    let mut b = LayerTreeBuilder::new(SIZE);
    b.push_container(LayerId(1))
        .unwrap()
        .add_picture(LayerId(2), strip(0.0, 2, Rgba8::opaque(1, 2, 3)))
        .unwrap()
        .add_picture(LayerId(3), strip(200.0, 2, Rgba8::opaque(1, 2, 3)))
        .unwrap()
        .pop()
        .unwrap();
    let mut tree = b.build().unwrap();
    preroll(&mut tree, None);
    let (ops, stats) = record(&tree, None);
    assert_eq!(stats.layers_culled, 1);
    assert_eq!(
        ops.iter()
            .filter(|op| matches!(op, CanvasOp::DrawDisplayList { .. }))
            .count(),
        1
    );
}

#[test]
fn clip_narrows_culling() {
    let mut b = LayerTreeBuilder::new(SIZE);
    b.push_clip_rect(LayerId(1), Rect::new(0.0, 0.0, 64.0, 8.0))
        .unwrap()
        .add_picture(LayerId(2), strip(0.0, 2, Rgba8::opaque(1, 2, 3)))
        .unwrap()
        .add_picture(LayerId(3), strip(20.0, 2, Rgba8::opaque(1, 2, 3)))
        .unwrap()
        .pop()
        .unwrap();
    let mut tree = b.build().unwrap();
    preroll(&mut tree, None);
    let (ops, stats) = record(&tree, None);
    assert_eq!(stats.layers_culled, 1);
    assert!(ops.iter().any(|op| matches!(
        op,
        CanvasOp::ClipRect { device_clip } if *device_clip == Rect::new(0.0, 0.0, 64.0, 8.0)
    )));
}

#[test]
fn texture_layers_draw_the_published_frame() {
    let registry = TextureRegistry::new();
    let frame = PortableImage::solid(ISize::new(2, 2), Rgba8::opaque(9, 9, 9)).unwrap();
    registry.publish(5, frame.clone());

    let mut b = LayerTreeBuilder::new(SIZE);
    b.push_container(LayerId(1))
        .unwrap()
        .add_texture(
            LayerId(2),
            TextureLayer {
                texture_id: 5,
                rect: Rect::new(10.0, 10.0, 30.0, 20.0),
                frozen: false,
            },
        )
        .unwrap()
        .add_texture(
            LayerId(3),
            TextureLayer {
                texture_id: 6,
                rect: Rect::new(40.0, 40.0, 50.0, 50.0),
                frozen: false,
            },
        )
        .unwrap()
        .pop()
        .unwrap();
    let mut tree = b.build().unwrap();
    preroll(&mut tree, None);

    let mut canvas = RecordingCanvas::new(SIZE);
    let factory = CpuRasterFactory::new();
    let mut ctx = PaintContext::new(&mut canvas, &factory).with_textures(&registry);
    paint_tree(&tree, &mut ctx);
    assert_eq!(ctx.stats().missing_textures, 1);

    let draw = canvas
        .ops()
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawImage {
                image_id,
                transform,
                ..
            } => Some((*image_id, *transform)),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw.0, frame.unique_id());
    assert_eq!(
        draw.1,
        Affine::translate((10.0, 10.0)) * Affine::scale_non_uniform(10.0, 5.0)
    );
}

fn cached_config() -> RasterCacheConfig {
    RasterCacheConfig {
        cost_threshold: 4,
        access_threshold: 2,
        ..RasterCacheConfig::default()
    }
}

fn cacheable_tree(dx: f64) -> LayerTree {
    cacheable_tree_in(dx, Rgba8::opaque(0, 200, 0))
}

fn cacheable_tree_in(dx: f64, color: Rgba8) -> LayerTree {
    let mut b = LayerTreeBuilder::new(SIZE);
    b.push_transform(LayerId(1), Affine::translate((dx, 3.0)))
        .unwrap()
        .add_picture(LayerId(2), strip(0.0, 6, color))
        .unwrap()
        .pop()
        .unwrap();
    b.build().unwrap()
}

#[test]
fn pictures_move_into_the_cache_after_access_threshold() {
    let mut cache = RasterCache::new(cached_config());

    let mut tree = cacheable_tree(0.0);
    preroll(&mut tree, Some(&mut cache));
    let (_, stats) = record(&tree, Some(&mut cache));
    assert_eq!(stats.cache_draws, 0);
    cache.sweep_after_frame();

    let mut tree = cacheable_tree(0.0);
    preroll(&mut tree, Some(&mut cache));
    let (ops, stats) = record(&tree, Some(&mut cache));
    assert_eq!(stats.cache_fills, 1);
    assert_eq!(stats.cache_draws, 1);
    assert!(
        !ops.iter()
            .any(|op| matches!(op, CanvasOp::DrawDisplayList { .. }))
    );
    cache.sweep_after_frame();

    // Integer panning keeps hitting the same entry.
    let mut tree = cacheable_tree(5.0);
    preroll(&mut tree, Some(&mut cache));
    let (ops, stats) = record(&tree, Some(&mut cache));
    assert_eq!(stats.cache_fills, 0);
    assert_eq!(stats.cache_draws, 1);
    let placed = ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawImage { transform, size, .. } => Some((*transform, *size)),
            _ => None,
        })
        .unwrap();
    assert_eq!(placed.0, Affine::translate((5.0, 3.0)));
    assert_eq!(placed.1, ISize::new(23, 3));
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn repainted_picture_under_the_same_id_is_not_served_from_the_cache() {
    let mut cache = RasterCache::new(cached_config());
    for _ in 0..2 {
        let mut tree = cacheable_tree(0.0);
        preroll(&mut tree, Some(&mut cache));
        record(&tree, Some(&mut cache));
        cache.sweep_after_frame();
    }
    assert_eq!(cache.stats().entries, 1);

    let blue = Rgba8::opaque(0, 0, 200);
    let mut tree = cacheable_tree_in(0.0, blue);
    preroll(&mut tree, Some(&mut cache));
    let (ops, stats) = record(&tree, Some(&mut cache));
    assert_eq!(stats.cache_draws, 0);
    assert!(
        ops.iter()
            .any(|op| matches!(op, CanvasOp::DrawDisplayList { .. }))
    );
    assert_eq!(cache.stats().entries, 0);
    cache.sweep_after_frame();

    // The new content earns its own entry once it has been seen long enough.
    let mut tree = cacheable_tree_in(0.0, blue);
    preroll(&mut tree, Some(&mut cache));
    let (_, stats) = record(&tree, Some(&mut cache));
    assert_eq!(stats.cache_fills, 1);
    cache.sweep_after_frame();

    let mut tree = cacheable_tree_in(0.0, blue);
    preroll(&mut tree, Some(&mut cache));
    let image = render(&tree, Some(&mut cache));
    let [r, g, b, a] = image.pixel(1, 4).unwrap();
    assert!(r < 8 && g < 8 && b > 190 && a == 255, "{:?}", [r, g, b, a]);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn fractional_panning_keeps_hitting_the_cache() {
    let mut cache = RasterCache::new(cached_config());
    for dx in [0.3, 1.3] {
        let mut tree = cacheable_tree(dx);
        preroll(&mut tree, Some(&mut cache));
        record(&tree, Some(&mut cache));
        cache.sweep_after_frame();
    }
    assert_eq!(cache.stats().entries, 1);

    for dx in [5.3, 17.3, 40.3] {
        let mut tree = cacheable_tree(dx);
        preroll(&mut tree, Some(&mut cache));
        let (_, stats) = record(&tree, Some(&mut cache));
        assert_eq!(stats.cache_fills, 0, "dx = {dx}");
        assert_eq!(stats.cache_draws, 1, "dx = {dx}");
        cache.sweep_after_frame();
    }
    assert_eq!(cache.stats().hits, 3);
}

fn render(tree: &LayerTree, cache: Option<&mut RasterCache>) -> PortableImage {
    let mut target: Box<dyn RenderTarget> = Box::new(CpuRenderTarget::new(SIZE).unwrap());
    let factory = CpuRasterFactory::new();
    {
        let mut ctx = PaintContext::new(target.canvas(), &factory);
        if let Some(cache) = cache {
            ctx = ctx.with_raster_cache(cache);
        }
        paint_tree(tree, &mut ctx);
    }
    target.snapshot().unwrap()
}

#[test]
fn cached_scope_matches_direct_rendering() {
    let mut cache = RasterCache::new(RasterCacheConfig {
        cost_threshold: 1,
        access_threshold: 1,
        ..RasterCacheConfig::default()
    });
    let mut tree = blend_tree(160, BlendMode::Screen);
    preroll(&mut tree, Some(&mut cache));
    assert!(tree.get(LayerId(1)).unwrap().is_cache_candidate());
    let cached = render(&tree, Some(&mut cache));
    assert_eq!(cache.stats().inserts, 1);

    let mut plain = blend_tree(160, BlendMode::Screen);
    preroll(&mut plain, None);
    let direct = render(&plain, None);

    for (x, y) in [(3, 1), (7, 11), (2, 10), (40, 40)] {
        let a = cached.pixel(x, y).unwrap();
        let b = direct.pixel(x, y).unwrap();
        for c in 0..4 {
            assert!(a[c].abs_diff(b[c]) <= 2, "({x}, {y}): {a:?} vs {b:?}");
        }
    }
}
