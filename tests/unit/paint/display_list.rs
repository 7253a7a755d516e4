use super::*;

fn red() -> Rgba8 {
    Rgba8::opaque(255, 0, 0)
}

#[test]
fn bounds_and_cost_accumulate_over_ops() {
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((10.0, 0.0));
    path.quad_to((15.0, 5.0), (10.0, 10.0));
    path.close_path();

    let list = DisplayListBuilder::new()
        .fill_rect(Rect::new(20.0, 20.0, 30.0, 40.0), red())
        .fill_path(path, red())
        .build();

    assert_eq!(list.ops().len(), 2);
    assert_eq!(list.bounds(), Rect::new(0.0, 0.0, 30.0, 40.0));
    // rect = 1, path = 1 + 1 line + 3 for the quad
    assert_eq!(list.cost(), 6);
}

#[test]
fn image_ops_are_weighted() {
    let img = PortableImage::solid(crate::foundation::core::ISize::new(4, 4), red()).unwrap();
    let list = DisplayListBuilder::new()
        .draw_image(img, Point::new(2.0, 3.0), 1.0)
        .build();
    assert_eq!(list.cost(), 4);
    assert_eq!(list.bounds(), Rect::new(2.0, 3.0, 6.0, 7.0));
}

#[test]
fn fingerprint_tracks_content() {
    let a = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red())
        .build();
    let b = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red())
        .build();
    let c = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 10.0, 11.0), red())
        .build();
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn group_opacity_requires_disjoint_ops() {
    let disjoint = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red())
        .fill_rect(Rect::new(10.0, 0.0, 20.0, 10.0), red())
        .build();
    assert!(disjoint.can_apply_group_opacity());

    let overlapping = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red())
        .fill_rect(Rect::new(5.0, 5.0, 15.0, 15.0), red())
        .build();
    assert!(!overlapping.can_apply_group_opacity());
}

#[test]
fn empty_list() {
    let list = DisplayListBuilder::new().build();
    assert!(list.is_empty());
    assert_eq!(list.bounds(), Rect::ZERO);
    assert_eq!(list.cost(), 0);
    assert!(list.can_apply_group_opacity());
}
