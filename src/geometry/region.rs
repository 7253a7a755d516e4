use kurbo::Rect;

/// Union of two rects where an empty operand contributes nothing.
///
/// `kurbo::Rect::union` treats a zero-area rect at the origin as a real point, which would
/// drag bounds toward `(0, 0)`.
pub fn union_nonempty(a: Rect, b: Rect) -> Rect {
    match (is_empty(a), is_empty(b)) {
        (true, true) => Rect::ZERO,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.union(b),
    }
}

/// Return `true` when both rects have area and overlap with positive area.
pub fn intersects_nonempty(a: Rect, b: Rect) -> bool {
    if is_empty(a) || is_empty(b) {
        return false;
    }
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Intersection of two rects, or [`Rect::ZERO`] when they do not overlap.
pub fn intersect_nonempty(a: Rect, b: Rect) -> Rect {
    if !intersects_nonempty(a, b) {
        return Rect::ZERO;
    }
    a.intersect(b)
}

/// Expand `r` outward to whole pixels.
pub fn round_out(r: Rect) -> Rect {
    if is_empty(r) {
        return Rect::ZERO;
    }
    Rect::new(r.x0.floor(), r.y0.floor(), r.x1.ceil(), r.y1.ceil())
}

/// Expand `r` outward to multiples of `alignment` pixels, clamped to `frame`.
pub fn align_out(r: Rect, alignment: u32, frame: Rect) -> Rect {
    let r = round_out(r);
    if is_empty(r) || alignment <= 1 {
        return intersect_nonempty(r, frame);
    }
    let a = f64::from(alignment);
    let aligned = Rect::new(
        (r.x0 / a).floor() * a,
        (r.y0 / a).floor() * a,
        (r.x1 / a).ceil() * a,
        (r.y1 / a).ceil() * a,
    );
    intersect_nonempty(aligned, frame)
}

pub(crate) fn is_empty(r: Rect) -> bool {
    !(r.x1 > r.x0 && r.y1 > r.y0)
}

fn covers(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Device-space rects that must be repainted this frame.
///
/// Rects are kept in insertion order. Adding an empty rect, or a rect already covered by an
/// earlier one, is a no-op. Rects may still overlap; consumers typically clip to [`bounds`].
///
/// [`bounds`]: DamageRegion::bounds
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct DamageRegion {
    rects: Vec<Rect>,
}

impl DamageRegion {
    /// Create an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rect to the region.
    pub fn add(&mut self, r: Rect) {
        let r = round_out(r);
        if is_empty(r) {
            return;
        }
        if self.rects.iter().any(|e| covers(*e, r)) {
            return;
        }
        self.rects.retain(|e| !covers(r, *e));
        self.rects.push(r);
    }

    /// Add every rect from `other`.
    pub fn extend(&mut self, other: &DamageRegion) {
        for r in &other.rects {
            self.add(*r);
        }
    }

    /// Rects in insertion order.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Return `true` when nothing needs repainting.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Union of all rects, or `None` for an empty region.
    pub fn bounds(&self) -> Option<Rect> {
        let mut it = self.rects.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union(r)))
    }

    /// Clip every rect to `frame`, dropping rects entirely outside it.
    pub fn clip_to(&mut self, frame: Rect) {
        let rects = std::mem::take(&mut self.rects);
        for r in rects {
            self.add(intersect_nonempty(r, frame));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/region.rs"]
mod tests;
