use crate::foundation::core::{BlendMode, Vec2};

/// Compositing layer grouping its children into one isolated scope with alpha and blend mode.
///
/// `alpha` is 0..=255 (opaque at 255). The children-accept-opacity flag is written by
/// preroll once per frame and only read afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendLayer {
    alpha: u8,
    offset: Vec2,
    blend_mode: BlendMode,
    children_can_accept_opacity: bool,
}

impl BlendLayer {
    /// Create a blend layer.
    pub fn new(alpha: u8, offset: Vec2, blend_mode: BlendMode) -> Self {
        Self {
            alpha,
            offset,
            blend_mode,
            children_can_accept_opacity: false,
        }
    }

    /// Source-over layer with the given alpha.
    pub fn opacity_layer(alpha: u8, offset: Vec2) -> Self {
        Self::new(alpha, offset, BlendMode::SrcOver)
    }

    /// Alpha in 0..=255.
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Offset applied to children.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Blend mode used when compositing the group.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Alpha as a fraction, `alpha / 255`.
    pub fn opacity(&self) -> f32 {
        f32::from(self.alpha) / 255.0
    }

    /// Return `true` when the group's opacity can be pushed down to each child instead of
    /// compositing an offscreen scope.
    ///
    /// Requires the default blend mode and a preroll verdict that every child subtree can
    /// inherit opacity independently.
    pub fn children_can_accept_opacity(&self) -> bool {
        self.children_can_accept_opacity && self.blend_mode.is_default()
    }

    pub(crate) fn set_children_can_accept_opacity(&mut self, value: bool) {
        self.children_can_accept_opacity = value;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/blend.rs"]
mod tests;
