use super::*;
use kurbo::Vec2;

#[test]
fn integer_translation_keeps_class() {
    let a = Affine::translate(Vec2::new(10.25, 3.0));
    let b = Affine::translate(Vec2::new(20.25, -7.0));
    assert_eq!(TransformClass::of(&a), TransformClass::of(&b));
}

#[test]
fn inexact_fractions_keep_class_across_magnitudes() {
    for frac in [0.1, 0.3, 0.7, 0.9] {
        let base = TransformClass::of(&Affine::translate(Vec2::new(10.0 + frac, frac)));
        for k in 0..2000 {
            let k = f64::from(k);
            let panned = Affine::translate(Vec2::new(k + frac, -k + frac));
            assert_eq!(TransformClass::of(&panned), base, "{k} + {frac}");
        }
    }
}

#[test]
fn fraction_close_to_one_matches_the_next_whole_pixel() {
    let almost = Affine::translate(Vec2::new(4.9999999, 0.0));
    let whole = Affine::translate(Vec2::new(5.0, 0.0));
    assert_eq!(TransformClass::of(&almost), TransformClass::of(&whole));
}

#[test]
fn fractional_or_linear_change_breaks_class() {
    let a = Affine::translate(Vec2::new(10.25, 3.0));
    let b = Affine::translate(Vec2::new(10.5, 3.0));
    assert_ne!(TransformClass::of(&a), TransformClass::of(&b));

    let s = Affine::scale(2.0);
    assert_ne!(TransformClass::of(&s), TransformClass::of(&Affine::IDENTITY));
}

#[test]
fn negative_translation_uses_floor_fraction() {
    let a = Affine::translate(Vec2::new(-0.75, 0.0));
    let b = Affine::translate(Vec2::new(0.25, 0.0));
    assert_eq!(TransformClass::of(&a), TransformClass::of(&b));
}

#[test]
fn map_rect_bbox_and_empty() {
    let r = Rect::new(0.0, 0.0, 10.0, 20.0);
    let t = Affine::translate(Vec2::new(5.0, 5.0)) * Affine::scale(2.0);
    assert_eq!(map_rect(t, r), Rect::new(5.0, 5.0, 25.0, 45.0));
    assert_eq!(map_rect(t, Rect::ZERO), Rect::ZERO);
}
