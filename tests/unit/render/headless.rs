use super::*;
use crate::{
    foundation::core::Rgba8,
    image::{PlatformTraits, TextureDescriptor, TextureUsage},
    paint::DisplayListBuilder,
};

fn binding(raw: &[i64], usage: TextureUsage) -> BackendTextureBinding {
    TextureDescriptor::from_raw(raw)
        .unwrap()
        .backend_binding(&PlatformTraits::ANDROID, usage)
}

#[test]
fn render_targets_produce_texture_backed_images() {
    let ctx = HeadlessContext::new(256);
    let mut target = ctx.make_render_target(ISize::new(4, 4)).unwrap();
    let list = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Rgba8::opaque(0, 255, 0))
        .build();
    target.canvas().draw_display_list(&list, 1.0);
    let img = target.snapshot().unwrap();

    assert!(img.is_texture_backed());
    assert!(img.backend_handle().unwrap() >= FIRST_FRAMEBUFFER_HANDLE);
    let raster = img.make_raster_image().unwrap();
    assert_eq!(raster.pixel(0, 0), Some([0, 255, 0, 255]));
    assert_eq!(ctx.render_targets_created(), 1);
}

#[test]
fn oversized_targets_are_refused() {
    let ctx = HeadlessContext::new(32);
    assert_eq!(ctx.max_render_target_size(), 32);
    assert!(ctx.make_render_target(ISize::new(33, 1)).is_none());
}

#[test]
fn context_loss_invalidates_everything() {
    let ctx = HeadlessContext::new(64);
    let img = ctx
        .make_render_target(ISize::new(2, 2))
        .unwrap()
        .snapshot()
        .unwrap();
    ctx.lose_context();

    assert!(!ctx.is_valid());
    assert!(!ctx.make_current());
    assert!(img.make_raster_image().is_none());
    assert!(ctx.make_render_target(ISize::new(2, 2)).is_none());
}

#[test]
fn make_current_failure_is_reported() {
    let ctx = HeadlessContext::new(64);
    assert!(ctx.make_current());
    ctx.set_make_current_fails(true);
    assert!(!ctx.make_current());
    assert!(ctx.is_valid());
}

#[test]
fn import_reads_registered_texture_and_swizzles_bgra() {
    let ctx = HeadlessContext::new(64);
    let handle = TextureHandle::Id(9);
    assert!(ctx.register_texture(handle, ISize::new(1, 1), ColorType::Bgra8888, Some(vec![10, 20, 30, 255])));

    let img = ctx
        .import_texture(&binding(&[0, 9, 1, 1, 0], TextureUsage::Sample))
        .unwrap();
    assert!(img.is_texture_backed());
    assert_eq!(img.pixel(0, 0), Some([30, 20, 10, 255]));

    assert!(ctx.import_texture(&binding(&[0, 10, 1, 1, 0], TextureUsage::Sample)).is_none());
    assert!(ctx.import_texture(&binding(&[0, 9, 2, 2, 0], TextureUsage::Sample)).is_none());
}

#[test]
fn texture_surface_writes_into_registered_texture() {
    let ctx = HeadlessContext::new(64);
    let handle = TextureHandle::Id(3);
    ctx.register_texture(handle, ISize::new(4, 4), ColorType::Rgba8888, None);

    let b = binding(&[0, 3, 4, 4, 0], TextureUsage::RenderTarget);
    let mut surface = ctx.make_surface_from_texture(&b).unwrap();
    let other = ctx.make_surface_from_texture(&b).unwrap();
    assert!(surface.is_valid());
    assert_ne!(surface.backend_handle(), Some(3));
    assert_ne!(surface.backend_handle(), other.backend_handle());
    assert!(surface.context().is_some());

    let list = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Rgba8::opaque(255, 255, 0))
        .build();
    let mut frame = surface.acquire_frame(None).unwrap();
    frame.canvas().draw_display_list(&list, 1.0);
    assert!(frame.submit());

    assert_eq!(&ctx.texture_pixels(handle).unwrap()[..4], &[255, 255, 0, 255]);

    ctx.lose_context();
    assert!(!surface.is_valid());
    assert!(surface.acquire_frame(None).is_none());
}

#[test]
fn surfaces_need_a_registered_texture() {
    let ctx = HeadlessContext::new(64);
    let b = binding(&[0, 77, 4, 4, 0], TextureUsage::RenderTarget);
    assert!(ctx.make_surface_from_texture(&b).is_none());
}
