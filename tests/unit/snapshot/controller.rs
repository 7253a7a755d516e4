use super::*;
use crate::{
    foundation::core::{Rect, Rgba8},
    paint::DisplayListBuilder,
    render::headless::HeadlessContext,
};

const RED: Rgba8 = Rgba8::opaque(255, 0, 0);

fn fill(size: ISize) -> DisplayList {
    DisplayListBuilder::new()
        .fill_rect(size.to_rect(), RED)
        .build()
}

fn software_only() -> SnapshotController {
    SnapshotController::new(
        Arc::new(SnapshotSources::default()),
        PlatformTraits::HOST,
    )
}

fn with_onscreen(ctx: &HeadlessContext, switch: GpuDisabledSwitch) -> SnapshotController {
    let sources = SnapshotSources::new(switch).with_onscreen_context(Arc::new(ctx.clone()));
    SnapshotController::new(Arc::new(sources), PlatformTraits::HOST)
}

#[test]
fn software_snapshot_without_context() {
    let controller = software_only();
    let list = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), RED)
        .build();
    let img = controller.make_raster_snapshot(&list, ISize::new(8, 8)).unwrap();

    assert_eq!(img.size(), ISize::new(8, 8));
    assert!(!img.is_texture_backed());
    assert_eq!(img.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(img.pixel(6, 6), Some([0, 0, 0, 0]));
}

#[test]
fn empty_requests_produce_nothing() {
    let controller = software_only();
    assert!(controller.make_raster_snapshot(&fill(ISize::new(1, 1)), ISize::new(0, 5)).is_none());
}

#[test]
fn onscreen_context_renders_and_reads_back() {
    let ctx = HeadlessContext::new(256);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    let size = ISize::new(16, 8);
    let img = controller.make_raster_snapshot(&fill(size), size).unwrap();

    assert_eq!(ctx.render_targets_created(), 1);
    assert!(!img.is_texture_backed(), "result must live in host memory");
    assert_eq!(img.size(), size);
    assert_eq!(img.pixel(15, 7), Some([255, 0, 0, 255]));
}

#[test]
fn oversized_requests_are_downscaled_uniformly() {
    let ctx = HeadlessContext::new(100);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    let requested = ISize::new(400, 200);
    let img = controller.make_raster_snapshot(&fill(requested), requested).unwrap();

    assert_eq!(img.size(), ISize::new(100, 50));
    assert_eq!(img.pixel(99, 49), Some([255, 0, 0, 255]));
}

#[test]
fn software_limit_also_downscales() {
    let controller = software_only().with_software_max_dimension(64);
    let requested = ISize::new(128, 32);
    let img = controller.make_raster_snapshot(&fill(requested), requested).unwrap();
    assert_eq!(img.size(), ISize::new(64, 16));
}

#[test]
fn disabled_gpu_takes_the_software_path() {
    let ctx = HeadlessContext::new(100);
    let switch = GpuDisabledSwitch::new(true);
    let controller = with_onscreen(&ctx, switch.clone());
    let requested = ISize::new(400, 200);
    let img = controller.make_raster_snapshot(&fill(requested), requested).unwrap();

    assert_eq!(ctx.render_targets_created(), 0);
    assert_eq!(img.size(), requested, "software targets are not limited by the gpu");

    switch.set_disabled(false);
    controller.make_raster_snapshot(&fill(requested), requested).unwrap();
    assert_eq!(ctx.render_targets_created(), 1);
}

#[test]
fn failing_make_current_produces_nothing() {
    let ctx = HeadlessContext::new(64);
    ctx.set_make_current_fails(true);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    assert!(controller.make_raster_snapshot(&fill(ISize::new(4, 4)), ISize::new(4, 4)).is_none());
}

#[test]
fn lost_onscreen_context_falls_back_to_software() {
    let ctx = HeadlessContext::new(64);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    ctx.lose_context();

    let img = controller.make_raster_snapshot(&fill(ISize::new(4, 4)), ISize::new(4, 4)).unwrap();
    assert_eq!(img.pixel(0, 0), Some([255, 0, 0, 255]));
}

#[test]
fn producer_context_is_used_without_onscreen_surface() {
    let pbuffer = HeadlessContext::new(64);
    let produced = pbuffer.clone();
    let sources = SnapshotSources::default().with_surface_producer(
        move || -> Option<Arc<dyn GpuContext>> { Some(Arc::new(produced.clone())) },
    );
    let controller = SnapshotController::new(Arc::new(sources), PlatformTraits::HOST);

    let requested = ISize::new(128, 128);
    let img = controller.make_raster_snapshot(&fill(requested), requested).unwrap();
    assert_eq!(pbuffer.render_targets_created(), 1);
    assert_eq!(img.size(), ISize::new(64, 64));
}

#[test]
fn texture_import_needs_a_known_format_and_a_context() {
    let ctx = HeadlessContext::new(64);
    ctx.register_texture(
        TextureHandle::Id(5),
        ISize::new(2, 2),
        ColorType::Rgba8888,
        Some([0, 0, 255, 255].repeat(4)),
    );

    let unknown = TextureDescriptor::from_raw(&[0, 5, 2, 2, 99]).unwrap();
    assert_eq!(unknown.color_type(), ColorType::Unknown);
    let known = TextureDescriptor::from_raw(&[0, 5, 2, 2, 0]).unwrap();

    assert!(software_only().make_from_texture(&known).is_none());

    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    assert!(controller.make_from_texture(&unknown).is_none());
    let img = controller.make_from_texture(&known).unwrap();
    assert!(img.is_texture_backed());
    assert_eq!(img.pixel(1, 1), Some([0, 0, 255, 255]));

    let missing = TextureDescriptor::from_raw(&[0, 6, 2, 2, 0]).unwrap();
    assert!(controller.make_from_texture(&missing).is_none());
}

#[test]
fn raw_textures_follow_the_platform_convention() {
    let ctx = HeadlessContext::new(64);
    ctx.register_texture(TextureHandle::Id(8), ISize::new(1, 1), ColorType::Rgba8888, None);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());

    let descriptor = controller.platform_descriptor(8, ISize::new(1, 1));
    assert_eq!(descriptor.handle(), TextureHandle::Id(8));
    assert_eq!(descriptor.color_type(), ColorType::Rgba8888);
    assert!(controller.make_from_raw_texture(8, ISize::new(1, 1)).is_some());

    let ios = SnapshotController::new(Arc::new(SnapshotSources::default()), PlatformTraits::IOS);
    let descriptor = ios.platform_descriptor(8, ISize::new(1, 1));
    assert_eq!(descriptor.handle(), TextureHandle::Pointer(8));
    assert_eq!(descriptor.color_type(), ColorType::Bgra8888);
}

#[test]
fn offscreen_surface_draws_into_the_external_texture() {
    let ctx = HeadlessContext::new(64);
    let handle = TextureHandle::Id(12);
    ctx.register_texture(handle, ISize::new(4, 4), ColorType::Rgba8888, None);
    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());

    let descriptor = controller.platform_descriptor(12, ISize::new(4, 4));
    let mut surface = controller.make_offscreen_surface(&descriptor).unwrap();
    assert_ne!(surface.backend_handle(), Some(12));

    let mut frame = surface.acquire_frame(None).unwrap();
    frame.canvas().draw_display_list(&fill(ISize::new(4, 4)), 1.0);
    assert!(frame.submit());
    assert_eq!(&ctx.texture_pixels(handle).unwrap()[..4], &[255, 0, 0, 255]);

    assert!(software_only().make_offscreen_surface(&descriptor).is_none());
    let unbound = controller.platform_descriptor(13, ISize::new(4, 4));
    assert!(controller.make_offscreen_surface(&unbound).is_none());
}

#[test]
fn raster_conversion_requires_an_onscreen_context() {
    let ctx = HeadlessContext::new(64);
    let texture_image = ctx
        .make_render_target(ISize::new(3, 3))
        .map(|mut t| {
            t.canvas().draw_display_list(&fill(ISize::new(3, 3)), 1.0);
            t.snapshot().unwrap()
        })
        .unwrap();
    assert!(texture_image.is_texture_backed());

    assert!(software_only().convert_to_raster_image(&texture_image).is_none());

    let controller = with_onscreen(&ctx, GpuDisabledSwitch::default());
    let raster = controller.convert_to_raster_image(&texture_image).unwrap();
    assert!(!raster.is_texture_backed());
    assert_eq!(raster.size(), ISize::new(3, 3));
    assert_eq!(raster.pixel(2, 2), Some([255, 0, 0, 255]));
}
