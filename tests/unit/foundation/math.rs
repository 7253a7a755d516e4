use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(0, 255), 0);
    assert_eq!(mul_div255_u8(128, 255), 128);
    assert_eq!(mul_div255_u8(255, 128), 128);
}

#[test]
fn stable_hasher_is_deterministic_and_folds_negative_zero() {
    let mut a = StableHasher::new();
    a.write_f64(0.0);
    a.write_u32(7);
    let mut b = StableHasher::new();
    b.write_f64(-0.0);
    b.write_u32(7);
    assert_eq!(a.finish(), b.finish());

    let mut c = StableHasher::new();
    c.write_f64(1.0);
    c.write_u32(7);
    let mut d = StableHasher::new();
    d.write_f64(0.0);
    d.write_u32(7);
    assert_ne!(c.finish(), d.finish());
}
