//! Layer tree: arena storage, layer kinds, and the builder.
//!
//! A [`LayerTree`] is an arena of [`LayerNode`]s addressed by [`NodeIndex`]. Parents own
//! their children through ordered index lists; the parent link is a plain index. Layer
//! identity ([`LayerId`]) is chosen by the scene builder and must be stable across frames,
//! because the diff pass pairs old and new layers by it and the raster cache keys on it.

mod blend;
mod builder;
mod kinds;
mod tree;

pub use blend::BlendLayer;
pub use builder::LayerTreeBuilder;
pub use kinds::{LayerKind, PictureLayer, TextureLayer};
pub use tree::{LayerNode, LayerTree, NodeIndex};
pub(crate) use tree::PrerollState;

/// Stable identity of a layer across frames.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
