use std::collections::HashMap;

use crate::{
    foundation::{
        core::{Affine, BlendMode, ISize, Rect, Vec2},
        error::{LaminateError, LaminateResult},
        math::StableHasher,
    },
    layer::{
        BlendLayer, LayerId, LayerKind, LayerNode, LayerTree, NodeIndex, PictureLayer,
        TextureLayer,
    },
};

/// Scene-builder style construction of a [`LayerTree`].
///
/// Container kinds are opened with a `push_*` call and closed with [`pop`]; leaves are
/// added to the innermost open container. The first layer added becomes the root.
///
/// ```
/// use laminate::{Affine, ISize, LayerId, LayerTreeBuilder};
///
/// let mut b = LayerTreeBuilder::new(ISize::new(100, 100));
/// b.push_container(LayerId(1))?
///     .push_transform(LayerId(2), Affine::scale(2.0))?
///     .pop()?
///     .pop()?;
/// let tree = b.build()?;
/// assert_eq!(tree.len(), 2);
/// # Ok::<(), laminate::LaminateError>(())
/// ```
///
/// [`pop`]: LayerTreeBuilder::pop
#[derive(Debug)]
pub struct LayerTreeBuilder {
    frame_size: ISize,
    nodes: Vec<LayerNode>,
    by_id: HashMap<LayerId, NodeIndex>,
    stack: Vec<NodeIndex>,
}

impl LayerTreeBuilder {
    /// Start a tree for a frame of `frame_size` device pixels.
    pub fn new(frame_size: ISize) -> Self {
        Self {
            frame_size,
            nodes: Vec::new(),
            by_id: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Open a plain container.
    pub fn push_container(&mut self, id: LayerId) -> LaminateResult<&mut Self> {
        self.push(id, LayerKind::Container)
    }

    /// Open a transform layer.
    pub fn push_transform(&mut self, id: LayerId, transform: Affine) -> LaminateResult<&mut Self> {
        self.push(id, LayerKind::Transform(transform))
    }

    /// Open a rect clip.
    pub fn push_clip_rect(&mut self, id: LayerId, clip: Rect) -> LaminateResult<&mut Self> {
        self.push(id, LayerKind::ClipRect(clip))
    }

    /// Open a blend layer.
    pub fn push_blend(
        &mut self,
        id: LayerId,
        alpha: u8,
        offset: Vec2,
        blend_mode: BlendMode,
    ) -> LaminateResult<&mut Self> {
        self.push(
            id,
            LayerKind::Blend(BlendLayer::new(alpha, offset, blend_mode)),
        )
    }

    /// Open a source-over blend layer.
    pub fn push_opacity(&mut self, id: LayerId, alpha: u8, offset: Vec2) -> LaminateResult<&mut Self> {
        self.push_blend(id, alpha, offset, BlendMode::SrcOver)
    }

    /// Add a picture leaf.
    pub fn add_picture(&mut self, id: LayerId, picture: PictureLayer) -> LaminateResult<&mut Self> {
        self.add(id, LayerKind::Picture(picture))
    }

    /// Add a texture leaf.
    pub fn add_texture(&mut self, id: LayerId, texture: TextureLayer) -> LaminateResult<&mut Self> {
        self.add(id, LayerKind::Texture(texture))
    }

    /// Open a container layer of any container kind.
    pub fn push(&mut self, id: LayerId, kind: LayerKind) -> LaminateResult<&mut Self> {
        if !kind.is_container() {
            return Err(LaminateError::validation(format!(
                "layer {id}: {} layers cannot have children",
                kind.name()
            )));
        }
        let idx = self.insert(id, kind)?;
        self.stack.push(idx);
        Ok(self)
    }

    /// Add a leaf layer.
    pub fn add(&mut self, id: LayerId, kind: LayerKind) -> LaminateResult<&mut Self> {
        if kind.is_container() {
            return Err(LaminateError::validation(format!(
                "layer {id}: {} layers must be pushed",
                kind.name()
            )));
        }
        self.insert(id, kind)?;
        Ok(self)
    }

    /// Close the innermost open container.
    pub fn pop(&mut self) -> LaminateResult<&mut Self> {
        if self.stack.pop().is_none() {
            return Err(LaminateError::validation("pop without a matching push"));
        }
        Ok(self)
    }

    /// Finish the tree and compute generation markers.
    pub fn build(self) -> LaminateResult<LayerTree> {
        let Self {
            frame_size,
            mut nodes,
            by_id,
            stack,
        } = self;
        if !stack.is_empty() {
            return Err(LaminateError::validation(format!(
                "{} container layer(s) left open",
                stack.len()
            )));
        }
        if nodes.is_empty() {
            return Err(LaminateError::validation("layer tree has no layers"));
        }

        // Pre-order storage: walking backwards visits children before parents.
        for i in (0..nodes.len()).rev() {
            let mut h = StableHasher::new();
            h.write_u64(nodes[i].local_fingerprint);
            h.write_u32(nodes[i].children.len() as u32);
            let mut live_texture =
                matches!(&nodes[i].kind, LayerKind::Texture(t) if !t.frozen);
            for &c in &nodes[i].children {
                let child = &nodes[c.index()];
                h.write_u64(child.id.0);
                h.write_u64(child.generation);
                live_texture |= child.has_live_texture;
            }
            nodes[i].generation = h.finish();
            nodes[i].has_live_texture = live_texture;
        }

        Ok(LayerTree::from_nodes(nodes, NodeIndex(0), frame_size, by_id))
    }

    fn insert(&mut self, id: LayerId, kind: LayerKind) -> LaminateResult<NodeIndex> {
        if self.by_id.contains_key(&id) {
            return Err(LaminateError::validation(format!(
                "duplicate layer identity {id}"
            )));
        }
        let parent = self.stack.last().copied();
        if parent.is_none() && !self.nodes.is_empty() {
            return Err(LaminateError::validation(format!(
                "layer {id} would be a second root"
            )));
        }
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(LayerNode::new(id, kind, parent));
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(idx);
        }
        self.by_id.insert(id, idx);
        Ok(idx)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/builder.rs"]
mod tests;
