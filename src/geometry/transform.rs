use kurbo::{Affine, Rect};

use super::region::is_empty;

/// Map `r` through `t` and return the axis-aligned bounding box of the result.
pub fn map_rect(t: Affine, r: Rect) -> Rect {
    if is_empty(r) {
        return Rect::ZERO;
    }
    t.transform_rect_bbox(r)
}

/// Equivalence class of a device transform for raster-cache lookups.
///
/// Two transforms belong to the same class when their linear parts are identical and their
/// translations differ by whole pixels only. A cached raster remains pixel-exact under such
/// a change, so panning content by integer offsets keeps hitting the cache.
///
/// The sub-pixel part of the translation is compared in 1/256 pixel steps; `v - floor(v)`
/// is not bit-stable across magnitudes for fractions like 0.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformClass {
    linear: [u64; 4],
    subpixel: [u16; 2],
}

impl TransformClass {
    /// Compute the class of `t`.
    pub fn of(t: &Affine) -> Self {
        let [a, b, c, d, e, f] = t.as_coeffs();
        Self {
            linear: [bits(a), bits(b), bits(c), bits(d)],
            subpixel: [subpixel(e), subpixel(f)],
        }
    }
}

const SUBPIXEL_STEPS: f64 = 256.0;

fn subpixel(v: f64) -> u16 {
    let steps = ((v - v.floor()) * SUBPIXEL_STEPS).round();
    // A fraction just below 1.0 rounds up to the next whole pixel.
    (steps as u16) % (SUBPIXEL_STEPS as u16)
}

fn bits(v: f64) -> u64 {
    (v + 0.0).to_bits()
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/transform.rs"]
mod tests;
