pub use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};

/// Integer pixel dimensions of a render target, snapshot, or texture.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ISize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ISize {
    /// Create a size from width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Return `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest of the two dimensions.
    pub fn max_dimension(self) -> u32 {
        self.width.max(self.height)
    }

    /// Scale both dimensions by `factor`, truncating toward zero.
    ///
    /// Non-empty sizes never collapse below one pixel per axis.
    pub fn scaled(self, factor: f64) -> Self {
        if self.is_empty() {
            return self;
        }
        let w = ((f64::from(self.width) * factor) as u32).max(1);
        let h = ((f64::from(self.height) * factor) as u32).max(1);
        Self::new(w, h)
    }

    /// Number of bytes needed for a tightly packed RGBA8 buffer of this size.
    pub fn rgba8_byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }

    /// The rect `(0, 0, width, height)`.
    pub fn to_rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Create a color from straight-alpha channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Return this color with its alpha multiplied by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
        Self {
            a: crate::foundation::math::mul_div255_u8(u16::from(self.a), op),
            ..self
        }
    }

    /// Convert to premultiplied channel order `[r, g, b, a]`.
    pub fn to_premul(self) -> [u8; 4] {
        let a = u16::from(self.a);
        let premul = |c: u8| crate::foundation::math::mul_div255_u8(u16::from(c), a);
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }
}

/// How a compositing scope combines with what is already on the canvas.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Source-over alpha compositing.
    #[default]
    SrcOver,
    /// Replace the destination.
    Src,
    /// Additive (plus-lighter).
    Plus,
    /// Multiply color channels.
    Multiply,
    /// Screen.
    Screen,
    /// Overlay.
    Overlay,
    /// Darken.
    Darken,
    /// Lighten.
    Lighten,
    /// Absolute difference.
    Difference,
}

impl BlendMode {
    /// Return `true` for the default source-over mode.
    pub fn is_default(self) -> bool {
        self == Self::SrcOver
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::SrcOver => 0,
            Self::Src => 1,
            Self::Plus => 2,
            Self::Multiply => 3,
            Self::Screen => 4,
            Self::Overlay => 5,
            Self::Darken => 6,
            Self::Lighten => 7,
            Self::Difference => 8,
        }
    }
}

/// Opacity and blend mode applied when a compositing scope is closed or an image is drawn.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LayerPaint {
    /// Alpha in `[0, 1]`.
    pub opacity: f32,
    /// Blend mode.
    pub blend: BlendMode,
}

impl LayerPaint {
    /// Fully opaque source-over.
    pub const OPAQUE: Self = Self {
        opacity: 1.0,
        blend: BlendMode::SrcOver,
    };

    /// Source-over with the given opacity.
    pub fn with_opacity(opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            blend: BlendMode::SrcOver,
        }
    }

    /// Return `true` when drawing with this paint is indistinguishable from opaque source-over.
    pub fn is_identity(&self) -> bool {
        self.opacity >= 1.0 && self.blend.is_default()
    }
}

impl Default for LayerPaint {
    fn default() -> Self {
        Self::OPAQUE
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
