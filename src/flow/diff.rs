use std::collections::HashMap;

use smallvec::SmallVec;

use crate::{
    foundation::core::{Affine, ISize, Rect},
    geometry::{DamageRegion, intersect_nonempty, map_rect, union_nonempty},
    layer::{LayerId, LayerKind, LayerNode, LayerTree, NodeIndex},
};

/// Outcome of diffing a new tree against the retained one.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct DiffResult {
    /// Device-space rects to repaint, clipped to the frame.
    pub damage: DamageRegion,
    /// The whole frame is damaged (no previous tree, different frame size, or new root).
    pub full_frame: bool,
    /// Layers compared individually.
    pub layers_visited: usize,
    /// Subtrees whose regions were carried over without walking them.
    pub subtrees_reused: usize,
}

/// Per-frame state of the diff pass.
///
/// Holds the transform and clip stacks of the walk, the damage accumulated so far, and the
/// device-space region of every layer visited. Regions are stored on the new tree so the
/// next frame can damage what this frame painted.
#[derive(Debug)]
pub struct DiffContext<'a> {
    old: Option<&'a LayerTree>,
    frame: Rect,
    transforms: Vec<Affine>,
    clips: Vec<Rect>,
    damage: DamageRegion,
    regions: HashMap<LayerId, Rect>,
    full_frame: bool,
    layers_visited: usize,
    subtrees_reused: usize,
}

impl<'a> DiffContext<'a> {
    /// Context for a frame of `frame_size` compared against `old`.
    pub fn new(old: Option<&'a LayerTree>, frame_size: ISize) -> Self {
        let frame = frame_size.to_rect();
        Self {
            old,
            frame,
            transforms: vec![Affine::IDENTITY],
            clips: vec![frame],
            damage: DamageRegion::new(),
            regions: HashMap::new(),
            full_frame: old.is_none_or(|o| o.frame_size() != frame_size),
            layers_visited: 0,
            subtrees_reused: 0,
        }
    }

    /// Start the walk from `root` (the surface's root transformation) instead of identity.
    pub fn with_root_transform(mut self, root: Affine) -> Self {
        self.transforms = vec![root];
        self
    }

    /// Current layer-to-device transform.
    pub fn transform(&self) -> Affine {
        self.transforms.last().copied().unwrap_or(Affine::IDENTITY)
    }

    /// Current device-space clip.
    pub fn clip(&self) -> Rect {
        self.clips.last().copied().unwrap_or(self.frame)
    }

    /// Damage accumulated so far.
    pub fn damage(&self) -> &DamageRegion {
        &self.damage
    }

    /// Return `true` when the whole frame will be reported as damaged.
    pub fn is_full_frame(&self) -> bool {
        self.full_frame
    }

    /// Mark a device-space rect as damaged.
    pub fn add_damage(&mut self, device_rect: Rect) {
        self.damage.add(device_rect);
    }

    /// Diff `new` against the old tree.
    pub fn diff_tree(mut self, new: &LayerTree) -> (DiffResult, HashMap<LayerId, Rect>) {
        let root = new.root();
        let old_root = self.old.and_then(|o| {
            let r = o.root();
            (o.node(r).id() == new.node(root).id()).then_some(r)
        });
        if self.old.is_some() && old_root.is_none() {
            self.full_frame = true;
        }
        let dirty = self.full_frame;
        self.diff_node(new, root, old_root, dirty);

        if self.full_frame {
            self.damage = DamageRegion::new();
            self.damage.add(self.frame);
        } else {
            self.damage.clip_to(self.frame);
        }
        let result = DiffResult {
            damage: self.damage,
            full_frame: self.full_frame,
            layers_visited: self.layers_visited,
            subtrees_reused: self.subtrees_reused,
        };
        (result, self.regions)
    }

    fn diff_node(
        &mut self,
        new: &LayerTree,
        idx: NodeIndex,
        old_idx: Option<NodeIndex>,
        dirty: bool,
    ) -> Rect {
        let node = new.node(idx);
        let old_tree = self.old;
        let old_node = old_idx.and_then(|o| old_tree.map(|t| t.node(o)));

        if !dirty
            && !node.has_live_texture
            && old_node.is_some_and(|o| o.generation() == node.generation())
            && let Some(region) = self.reuse_subtree(new, idx)
        {
            self.subtrees_reused += 1;
            return region;
        }

        self.layers_visited += 1;
        let local_changed = old_node.is_none_or(|o| o.local_fingerprint != node.local_fingerprint);
        let old_region = old_node.and_then(|o| old_tree.and_then(|t| t.paint_region(o.id())));

        let region = match &node.kind {
            LayerKind::Picture(p) => {
                let r = self.device_rect(p.paint_bounds());
                if dirty || local_changed {
                    self.damage_old_and_new(old_region, r);
                }
                r
            }
            LayerKind::Texture(t) => {
                let r = self.device_rect(t.rect);
                if dirty || local_changed || !t.frozen {
                    self.damage_old_and_new(old_region, r);
                }
                r
            }
            kind => {
                let pairs = pair_children(new, node, old_tree, old_idx);
                let reordered = old_tree
                    .zip(old_idx)
                    .is_some_and(|(t, o)| children_reordered(new, node, t, t.node(o)));
                // Attribute changes and reorders invalidate everything the container covers.
                let child_dirty = dirty || local_changed || reordered;

                self.push_state(kind);
                let mut region = Rect::ZERO;
                for (child, old_child) in pairs {
                    let r = self.diff_node(new, child, old_child, child_dirty);
                    region = union_nonempty(region, r);
                }
                self.pop_state();

                if child_dirty {
                    self.damage_old_and_new(old_region, region);
                }
                if let (Some(t), Some(o)) = (old_tree, old_node) {
                    self.damage_removed_children(new, node, t, o);
                }
                region
            }
        };

        self.regions.insert(node.id(), region);
        region
    }

    /// Carry over the old regions of an unchanged subtree. `None` when any of them is
    /// unknown.
    fn reuse_subtree(&mut self, new: &LayerTree, idx: NodeIndex) -> Option<Rect> {
        let old = self.old?;
        let mut carried = Vec::new();
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            let node = new.node(i);
            carried.push((node.id(), old.paint_region(node.id())?));
            stack.extend(node.children().iter().copied());
        }
        let root_region = carried.first().map(|(_, r)| *r);
        self.regions.extend(carried);
        root_region
    }

    fn damage_old_and_new(&mut self, old_region: Option<Rect>, new_region: Rect) {
        if let Some(r) = old_region {
            self.damage.add(r);
        }
        self.damage.add(new_region);
    }

    fn damage_removed_children(
        &mut self,
        new: &LayerTree,
        node: &LayerNode,
        old_tree: &LayerTree,
        old_node: &LayerNode,
    ) {
        for &oc in old_node.children() {
            let id = old_tree.node(oc).id();
            let kept = node.children().iter().any(|&c| new.node(c).id() == id);
            if !kept && let Some(r) = old_tree.paint_region(id) {
                self.damage.add(r);
            }
        }
    }

    fn device_rect(&self, local: Rect) -> Rect {
        intersect_nonempty(map_rect(self.transform(), local), self.clip())
    }

    fn push_state(&mut self, kind: &LayerKind) {
        let ctm = self.transform();
        let clip = match kind {
            LayerKind::ClipRect(c) => intersect_nonempty(self.clip(), map_rect(ctm, *c)),
            _ => self.clip(),
        };
        self.transforms.push(ctm * kind.child_transform());
        self.clips.push(clip);
    }

    fn pop_state(&mut self) {
        self.transforms.pop();
        self.clips.pop();
    }
}

/// Pair each new child with the old layer of the same identity under the same parent.
fn pair_children(
    new: &LayerTree,
    node: &LayerNode,
    old_tree: Option<&LayerTree>,
    old_parent: Option<NodeIndex>,
) -> SmallVec<[(NodeIndex, Option<NodeIndex>); 4]> {
    node.children()
        .iter()
        .map(|&c| {
            let old_child = old_tree.zip(old_parent).and_then(|(t, p)| {
                t.find(new.node(c).id())
                    .filter(|&oc| t.node(oc).parent() == Some(p))
            });
            (c, old_child)
        })
        .collect()
}

/// Return `true` when children present in both frames changed relative order.
fn children_reordered(
    new: &LayerTree,
    node: &LayerNode,
    old_tree: &LayerTree,
    old_node: &LayerNode,
) -> bool {
    let new_ids: SmallVec<[LayerId; 8]> = node
        .children()
        .iter()
        .map(|&c| new.node(c).id())
        .filter(|id| {
            old_node
                .children()
                .iter()
                .any(|&oc| old_tree.node(oc).id() == *id)
        })
        .collect();
    let old_ids: SmallVec<[LayerId; 8]> = old_node
        .children()
        .iter()
        .map(|&oc| old_tree.node(oc).id())
        .filter(|id| new_ids.contains(id))
        .collect();
    new_ids != old_ids
}

/// Diff `new` against `old`, store the new paint regions on `new`, and return the damage.
pub fn diff_trees(old: Option<&LayerTree>, new: &mut LayerTree) -> DiffResult {
    diff_trees_with_root(old, new, Affine::IDENTITY)
}

/// Like [`diff_trees`], with layers mapped to device space through `root` first.
///
/// `old` must have been diffed under the same `root`; its stored regions are device rects.
#[tracing::instrument(skip_all, fields(layers = new.len()))]
pub fn diff_trees_with_root(
    old: Option<&LayerTree>,
    new: &mut LayerTree,
    root: Affine,
) -> DiffResult {
    let ctx = DiffContext::new(old, new.frame_size()).with_root_transform(root);
    let (result, regions) = ctx.diff_tree(new);
    new.set_paint_regions(regions);
    tracing::debug!(
        full_frame = result.full_frame,
        rects = result.damage.rects().len(),
        visited = result.layers_visited,
        reused = result.subtrees_reused,
        "diff complete"
    );
    result
}

#[cfg(test)]
#[path = "../../tests/unit/flow/diff.rs"]
mod tests;
