use std::{collections::HashMap, fmt::Write as _};

use smallvec::SmallVec;

use crate::{
    foundation::{
        core::{ISize, Rect},
        error::{LaminateError, LaminateResult},
    },
    layer::{BlendLayer, LayerId, LayerKind},
};

/// Position of a node in a [`LayerTree`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    /// Arena slot.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-frame results written by preroll.
#[derive(Clone, Debug, Default)]
pub(crate) struct PrerollState {
    /// Bounds in the parent's coordinate space.
    pub(crate) paint_bounds: Rect,
    pub(crate) subtree_can_inherit_opacity: bool,
    /// One flag per child: that child can take the parent's opacity on its own.
    pub(crate) child_opacity_flags: SmallVec<[bool; 4]>,
    pub(crate) has_texture_layer: bool,
    pub(crate) cache_candidate: bool,
    /// Display-list complexity of the subtree, used as the raster cache cost.
    pub(crate) raster_cost: u64,
}

/// One layer in the arena.
#[derive(Clone, Debug)]
pub struct LayerNode {
    pub(crate) id: LayerId,
    pub(crate) kind: LayerKind,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) children: SmallVec<[NodeIndex; 4]>,
    pub(crate) local_fingerprint: u64,
    pub(crate) generation: u64,
    pub(crate) has_live_texture: bool,
    pub(crate) preroll: PrerollState,
}

impl LayerNode {
    pub(crate) fn new(id: LayerId, kind: LayerKind, parent: Option<NodeIndex>) -> Self {
        let local_fingerprint = kind.local_fingerprint();
        Self {
            id,
            kind,
            parent,
            children: SmallVec::new(),
            local_fingerprint,
            generation: 0,
            has_live_texture: false,
            preroll: PrerollState::default(),
        }
    }

    /// Stable identity.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Layer kind and attributes.
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Children in paint order.
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Mutation-generation marker: equal markers mean equal subtree content.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Blend attributes for blend layers.
    pub fn blend(&self) -> Option<&BlendLayer> {
        match &self.kind {
            LayerKind::Blend(b) => Some(b),
            _ => None,
        }
    }

    /// Paint bounds in the parent's coordinate space, as computed by the last preroll.
    pub fn paint_bounds(&self) -> Rect {
        self.preroll.paint_bounds
    }

    /// Preroll verdict: this subtree can take an inherited opacity without a scope.
    pub fn subtree_can_inherit_opacity(&self) -> bool {
        self.preroll.subtree_can_inherit_opacity
    }

    /// Preroll verdict per child, see [`PrerollState`].
    pub fn child_opacity_flags(&self) -> &[bool] {
        &self.preroll.child_opacity_flags
    }

    /// Preroll verdict: the subtree contains a texture layer.
    pub fn has_texture_layer(&self) -> bool {
        self.preroll.has_texture_layer
    }

    /// Preroll verdict: the layer's output is a raster cache candidate this frame.
    pub fn is_cache_candidate(&self) -> bool {
        self.preroll.cache_candidate
    }
}

/// A built layer tree, ready for diff, preroll, and paint.
#[derive(Clone, Debug)]
pub struct LayerTree {
    nodes: Vec<LayerNode>,
    root: NodeIndex,
    frame_size: ISize,
    by_id: HashMap<LayerId, NodeIndex>,
    paint_regions: HashMap<LayerId, Rect>,
    prerolled: bool,
}

impl LayerTree {
    /// `nodes` must be in pre-order: every child sits after its parent.
    pub(crate) fn from_nodes(
        nodes: Vec<LayerNode>,
        root: NodeIndex,
        frame_size: ISize,
        by_id: HashMap<LayerId, NodeIndex>,
    ) -> Self {
        Self {
            nodes,
            root,
            frame_size,
            by_id,
            paint_regions: HashMap::new(),
            prerolled: false,
        }
    }

    /// Root node.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Device size the tree is composed for.
    pub fn frame_size(&self) -> ISize {
        self.frame_size
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` for a tree without layers (never produced by the builder).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `idx`.
    pub fn node(&self, idx: NodeIndex) -> &LayerNode {
        &self.nodes[idx.index()]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut LayerNode {
        &mut self.nodes[idx.index()]
    }

    /// Arena index of the layer with identity `id`.
    pub fn find(&self, id: LayerId) -> Option<NodeIndex> {
        self.by_id.get(&id).copied()
    }

    /// Layer with identity `id`.
    pub fn get(&self, id: LayerId) -> Option<&LayerNode> {
        self.find(id).map(|idx| self.node(idx))
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &LayerNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(i as u32), n))
    }

    /// Device-space region the layer covered when this tree was diffed.
    pub fn paint_region(&self, id: LayerId) -> Option<Rect> {
        self.paint_regions.get(&id).copied()
    }

    pub(crate) fn set_paint_regions(&mut self, regions: HashMap<LayerId, Rect>) {
        self.paint_regions = regions;
    }

    /// Return `true` once preroll has run on this tree.
    pub fn is_prerolled(&self) -> bool {
        self.prerolled
    }

    pub(crate) fn mark_prerolled(&mut self) {
        self.prerolled = true;
    }

    /// Compositing layers without children, in pre-order.
    pub fn empty_compositing_layers(&self) -> Vec<LayerId> {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_compositing() && n.children.is_empty())
            .map(|n| n.id)
            .collect()
    }

    /// Check the structural preconditions of the paint pass.
    ///
    /// A compositing layer without children would open an offscreen scope and composite
    /// nothing, so such trees are rejected.
    pub fn validate(&self) -> LaminateResult<()> {
        let empty = self.empty_compositing_layers();
        if empty.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = empty.iter().map(ToString::to_string).collect();
        Err(LaminateError::validation(format!(
            "compositing layer(s) without children: {}",
            ids.join(", ")
        )))
    }

    /// Indented one-line-per-layer description, for logs and the CLI.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, idx: NodeIndex, depth: usize, out: &mut String) {
        let node = self.node(idx);
        let b = node.preroll.paint_bounds;
        let _ = writeln!(
            out,
            "{:indent$}{} {} bounds=({:.1}, {:.1}, {:.1}, {:.1})",
            "",
            node.kind.name(),
            node.id,
            b.x0,
            b.y0,
            b.x1,
            b.y1,
            indent = depth * 2
        );
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/tree.rs"]
mod tests;
