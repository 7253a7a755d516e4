//! Rectangle and transform math shared by the diff, preroll, and paint passes.

mod region;
mod transform;

pub use region::{
    DamageRegion, align_out, intersect_nonempty, intersects_nonempty, round_out, union_nonempty,
};
pub use transform::{TransformClass, map_rect};
