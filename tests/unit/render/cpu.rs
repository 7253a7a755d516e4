use super::*;
use crate::paint::DisplayListBuilder;

fn red_square(size: f64) -> DisplayList {
    DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, size, size), Rgba8::opaque(255, 0, 0))
        .build()
}

fn near(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}

#[test]
fn target_renders_display_list_pixels() {
    let mut target = CpuRenderTarget::new(ISize::new(16, 16)).unwrap();
    target.canvas().translate(crate::foundation::core::Vec2::new(4.0, 4.0));
    target.canvas().draw_display_list(&red_square(8.0), 1.0);
    let img = Box::new(target).snapshot().unwrap();

    assert_eq!(img.size(), ISize::new(16, 16));
    assert_eq!(img.pixel(8, 8), Some([255, 0, 0, 255]));
    assert_eq!(img.pixel(1, 1), Some([0, 0, 0, 0]));
    assert!(!img.is_texture_backed());
}

#[test]
fn save_layer_applies_group_opacity() {
    let mut target = CpuRenderTarget::new(ISize::new(8, 8)).unwrap();
    let canvas = target.canvas();
    canvas.save_layer(None, LayerPaint::with_opacity(0.5));
    canvas.draw_display_list(&red_square(8.0), 1.0);
    canvas.restore();
    let img = Box::new(target).snapshot().unwrap();

    let [r, g, b, a] = img.pixel(4, 4).unwrap();
    assert!(near(a, 128), "alpha {a}");
    assert!(near(r, 128), "red {r}");
    assert_eq!((g, b), (0, 0));
}

#[test]
fn draw_image_places_pixels_at_offset() {
    let img = PortableImage::solid(ISize::new(2, 2), Rgba8::opaque(0, 0, 255)).unwrap();
    let mut target = CpuRenderTarget::new(ISize::new(8, 8)).unwrap();
    target
        .canvas()
        .draw_image(&img, Point::new(3.0, 3.0), LayerPaint::OPAQUE);
    let out = Box::new(target).snapshot().unwrap();
    assert_eq!(out.pixel(4, 4), Some([0, 0, 255, 255]));
    assert_eq!(out.pixel(2, 2), Some([0, 0, 0, 0]));
}

#[test]
fn factory_enforces_limits() {
    let factory = CpuRasterFactory::with_max_dimension(64);
    assert_eq!(factory.max_render_target_size(), 64);
    assert!(factory.make_render_target(ISize::new(64, 10)).is_some());
    assert!(factory.make_render_target(ISize::new(65, 10)).is_none());
    assert!(factory.make_render_target(ISize::new(0, 10)).is_none());
    assert!(CpuRenderTarget::new(ISize::new(70_000, 1)).is_none());
}

#[test]
fn surface_partial_repaint_keeps_pixels_outside_rect() {
    let mut surface = CpuSurface::new(ISize::new(8, 8));
    assert!(surface.is_valid());
    assert!(surface.context().is_none());

    let mut frame = surface.acquire_frame(None).unwrap();
    frame.canvas().draw_display_list(&red_square(8.0), 1.0);
    assert!(frame.submit());

    let mut frame = surface.acquire_frame(Some(Rect::new(0.0, 0.0, 4.0, 8.0))).unwrap();
    assert!(frame.supports_readback());
    assert!(frame.submit());

    let img = surface.snapshot().unwrap();
    assert_eq!(img.pixel(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(img.pixel(6, 6), Some([255, 0, 0, 255]));
}

#[test]
fn full_repaint_starts_transparent() {
    let mut surface = CpuSurface::new(ISize::new(4, 4));
    let mut frame = surface.acquire_frame(None).unwrap();
    frame.canvas().draw_display_list(&red_square(4.0), 1.0);
    frame.submit();

    let frame = surface.acquire_frame(None).unwrap();
    frame.submit();
    assert_eq!(surface.snapshot().unwrap().pixel(2, 2), Some([0, 0, 0, 0]));
}
