use super::*;

#[test]
fn opacity_hits_exact_boundaries() {
    assert_eq!(BlendLayer::opacity_layer(0, Vec2::ZERO).opacity(), 0.0);
    assert_eq!(BlendLayer::opacity_layer(255, Vec2::ZERO).opacity(), 1.0);
}

#[test]
fn opacity_is_monotonic() {
    let mut prev = -1.0f32;
    for alpha in 0..=255u8 {
        let o = BlendLayer::opacity_layer(alpha, Vec2::ZERO).opacity();
        assert!(o > prev, "alpha {alpha}: {o} <= {prev}");
        assert!((0.0..=1.0).contains(&o));
        prev = o;
    }
}

#[test]
fn accept_opacity_requires_preroll_verdict() {
    let mut layer = BlendLayer::opacity_layer(128, Vec2::ZERO);
    assert!(!layer.children_can_accept_opacity());
    layer.set_children_can_accept_opacity(true);
    assert!(layer.children_can_accept_opacity());
    layer.set_children_can_accept_opacity(false);
    assert!(!layer.children_can_accept_opacity());
}

#[test]
fn non_default_blend_never_accepts_opacity() {
    for mode in [
        BlendMode::Src,
        BlendMode::Plus,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::Difference,
    ] {
        let mut layer = BlendLayer::new(200, Vec2::new(1.0, 2.0), mode);
        layer.set_children_can_accept_opacity(true);
        assert!(!layer.children_can_accept_opacity(), "{mode:?}");
    }
}
