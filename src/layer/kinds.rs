use crate::{
    foundation::core::{Affine, Rect, Vec2},
    foundation::math::StableHasher,
    geometry::map_rect,
    layer::BlendLayer,
    paint::DisplayList,
};

/// Leaf layer drawing a recorded display list.
#[derive(Clone, Debug)]
pub struct PictureLayer {
    /// Recorded content.
    pub display_list: DisplayList,
    /// Offset applied to the content.
    pub offset: Vec2,
    /// Hint that the content is expensive enough to cache regardless of its cost score.
    pub is_complex: bool,
    /// Hint that the content changes every frame and should never be cached.
    pub will_change: bool,
}

impl PictureLayer {
    /// Picture at `offset` with no caching hints.
    pub fn new(display_list: DisplayList, offset: Vec2) -> Self {
        Self {
            display_list,
            offset,
            is_complex: false,
            will_change: false,
        }
    }

    /// Bounds in the parent's coordinate space.
    pub fn paint_bounds(&self) -> Rect {
        map_rect(Affine::translate(self.offset), self.display_list.bounds())
    }
}

/// Leaf layer showing the latest frame of an external texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureLayer {
    /// Texture registry id.
    pub texture_id: u64,
    /// Destination rect in the parent's coordinate space.
    pub rect: Rect,
    /// When set, the texture is not expected to change and is not damaged every frame.
    pub frozen: bool,
}

/// Closed set of layer kinds.
#[derive(Clone, Debug)]
pub enum LayerKind {
    /// Groups children without effect.
    Container,
    /// Applies a transform to its children.
    Transform(Affine),
    /// Clips its children to a rect in local coordinates.
    ClipRect(Rect),
    /// Composites its children with alpha and blend mode.
    Blend(BlendLayer),
    /// Draws a display list.
    Picture(PictureLayer),
    /// Draws an external texture.
    Texture(TextureLayer),
}

impl LayerKind {
    /// Return `true` for kinds that own children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Container | Self::Transform(_) | Self::ClipRect(_) | Self::Blend(_)
        )
    }

    /// Return `true` for kinds that open an offscreen compositing scope.
    pub fn is_compositing(&self) -> bool {
        matches!(self, Self::Blend(_))
    }

    /// Short kind name for logs and dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Transform(_) => "transform",
            Self::ClipRect(_) => "clip_rect",
            Self::Blend(_) => "blend",
            Self::Picture(_) => "picture",
            Self::Texture(_) => "texture",
        }
    }

    /// Transform this layer applies to its children.
    pub(crate) fn child_transform(&self) -> Affine {
        match self {
            Self::Transform(t) => *t,
            Self::Blend(b) => Affine::translate(b.offset()),
            _ => Affine::IDENTITY,
        }
    }

    /// Hash of the layer's own attributes, excluding children.
    pub(crate) fn local_fingerprint(&self) -> u64 {
        let mut h = StableHasher::new();
        h.write_bytes(self.name().as_bytes());
        match self {
            Self::Container => {}
            Self::Transform(t) => h.write_affine(*t),
            Self::ClipRect(r) => h.write_rect(*r),
            Self::Blend(b) => {
                h.write_u8(b.alpha());
                h.write_f64(b.offset().x);
                h.write_f64(b.offset().y);
                h.write_u8(b.blend_mode().tag());
            }
            Self::Picture(p) => {
                h.write_u64(p.display_list.fingerprint());
                h.write_f64(p.offset.x);
                h.write_f64(p.offset.y);
                h.write_bool(p.is_complex);
                h.write_bool(p.will_change);
            }
            Self::Texture(t) => {
                h.write_u64(t.texture_id);
                h.write_rect(t.rect);
                h.write_bool(t.frozen);
            }
        }
        h.finish()
    }
}
