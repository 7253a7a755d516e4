use std::sync::Arc;

use kurbo::{PathEl, Shape};

use crate::{
    foundation::core::{BezPath, Point, Rect, Rgba8},
    foundation::math::StableHasher,
    geometry::{intersects_nonempty, union_nonempty},
    image::PortableImage,
};

/// Above this many ops the pairwise overlap test is skipped and group opacity is refused.
const MAX_OPACITY_OVERLAP_CHECK_OPS: usize = 64;

/// A single recorded drawing operation.
#[derive(Clone, Debug)]
pub enum DrawOp {
    /// Fill an axis-aligned rect with a solid color.
    FillRect {
        /// Rect in list-local coordinates.
        rect: Rect,
        /// Straight-alpha fill color.
        color: Rgba8,
    },
    /// Fill a path (non-zero winding) with a solid color.
    FillPath {
        /// Path in list-local coordinates.
        path: BezPath,
        /// Straight-alpha fill color.
        color: Rgba8,
    },
    /// Draw an image with its top-left corner at `at`.
    DrawImage {
        /// Image to draw.
        image: PortableImage,
        /// Top-left corner in list-local coordinates.
        at: Point,
        /// Extra opacity multiplier in `[0, 1]`.
        opacity: f32,
    },
}

impl DrawOp {
    /// Conservative bounds of the pixels this op may touch.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::FillRect { rect, .. } => *rect,
            Self::FillPath { path, .. } => path.bounding_box(),
            Self::DrawImage { image, at, .. } => Rect::from_origin_size(
                *at,
                (f64::from(image.width()), f64::from(image.height())),
            ),
        }
    }

    fn cost(&self) -> u64 {
        match self {
            Self::FillRect { .. } => 1,
            Self::DrawImage { .. } => 4,
            Self::FillPath { path, .. } => {
                1 + path
                    .elements()
                    .iter()
                    .map(|el| match el {
                        PathEl::LineTo(_) => 1,
                        PathEl::QuadTo(..) | PathEl::CurveTo(..) => 3,
                        PathEl::MoveTo(_) | PathEl::ClosePath => 0,
                    })
                    .sum::<u64>()
            }
        }
    }

    fn write_fingerprint(&self, h: &mut StableHasher) {
        match self {
            Self::FillRect { rect, color } => {
                h.write_u8(0);
                h.write_rect(*rect);
                h.write_bytes(&[color.r, color.g, color.b, color.a]);
            }
            Self::FillPath { path, color } => {
                h.write_u8(1);
                h.write_u32(path.elements().len() as u32);
                for el in path.elements() {
                    match *el {
                        PathEl::MoveTo(p) => {
                            h.write_u8(0);
                            h.write_f64(p.x);
                            h.write_f64(p.y);
                        }
                        PathEl::LineTo(p) => {
                            h.write_u8(1);
                            h.write_f64(p.x);
                            h.write_f64(p.y);
                        }
                        PathEl::QuadTo(p1, p2) => {
                            h.write_u8(2);
                            for p in [p1, p2] {
                                h.write_f64(p.x);
                                h.write_f64(p.y);
                            }
                        }
                        PathEl::CurveTo(p1, p2, p3) => {
                            h.write_u8(3);
                            for p in [p1, p2, p3] {
                                h.write_f64(p.x);
                                h.write_f64(p.y);
                            }
                        }
                        PathEl::ClosePath => h.write_u8(4),
                    }
                }
                h.write_bytes(&[color.r, color.g, color.b, color.a]);
            }
            Self::DrawImage { image, at, opacity } => {
                h.write_u8(2);
                h.write_u64(image.unique_id());
                h.write_f64(at.x);
                h.write_f64(at.y);
                h.write_u32(opacity.to_bits());
            }
        }
    }
}

#[derive(Debug)]
struct DisplayListInner {
    ops: Vec<DrawOp>,
    bounds: Rect,
    cost: u64,
    fingerprint: u64,
    can_apply_group_opacity: bool,
}

/// Immutable recording of drawing operations.
///
/// Cloning is cheap; the recording is shared. Bounds, complexity cost, fingerprint, and the
/// group-opacity capability are computed once at build time.
#[derive(Clone, Debug)]
pub struct DisplayList {
    inner: Arc<DisplayListInner>,
}

impl DisplayList {
    /// Recorded operations in paint order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.inner.ops
    }

    /// Union of all op bounds in list-local coordinates.
    pub fn bounds(&self) -> Rect {
        self.inner.bounds
    }

    /// Rendering complexity estimate used by the raster cache.
    ///
    /// The score counts recorded work (ops and path segments), not time.
    pub fn cost(&self) -> u64 {
        self.inner.cost
    }

    /// Stable content hash; equal lists have equal fingerprints.
    pub fn fingerprint(&self) -> u64 {
        self.inner.fingerprint
    }

    /// Return `true` when applying an opacity to each op separately matches applying it to
    /// the composited group, i.e. no two ops overlap.
    pub fn can_apply_group_opacity(&self) -> bool {
        self.inner.can_apply_group_opacity
    }

    /// Return `true` when the list draws nothing.
    pub fn is_empty(&self) -> bool {
        self.inner.ops.is_empty()
    }
}

/// Records [`DrawOp`]s into a [`DisplayList`].
#[derive(Debug, Default)]
pub struct DisplayListBuilder {
    ops: Vec<DrawOp>,
}

impl DisplayListBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a solid rect fill.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8) -> &mut Self {
        self.ops.push(DrawOp::FillRect { rect, color });
        self
    }

    /// Record a solid path fill.
    pub fn fill_path(&mut self, path: BezPath, color: Rgba8) -> &mut Self {
        self.ops.push(DrawOp::FillPath { path, color });
        self
    }

    /// Record an image draw.
    pub fn draw_image(&mut self, image: PortableImage, at: Point, opacity: f32) -> &mut Self {
        self.ops.push(DrawOp::DrawImage {
            image,
            at,
            opacity: opacity.clamp(0.0, 1.0),
        });
        self
    }

    /// Finish recording.
    pub fn build(&mut self) -> DisplayList {
        let ops = std::mem::take(&mut self.ops);

        let mut bounds = Rect::ZERO;
        let mut cost = 0u64;
        let mut h = StableHasher::new();
        h.write_u32(ops.len() as u32);
        for op in &ops {
            bounds = union_nonempty(bounds, op.bounds());
            cost = cost.saturating_add(op.cost());
            op.write_fingerprint(&mut h);
        }

        let can_apply_group_opacity = ops.len() <= MAX_OPACITY_OVERLAP_CHECK_OPS
            && ops.iter().enumerate().all(|(i, a)| {
                ops[..i]
                    .iter()
                    .all(|b| !intersects_nonempty(a.bounds(), b.bounds()))
            });

        DisplayList {
            inner: Arc::new(DisplayListInner {
                ops,
                bounds,
                cost,
                fingerprint: h.finish(),
                can_apply_group_opacity,
            }),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/paint/display_list.rs"]
mod tests;
