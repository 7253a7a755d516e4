use crate::{
    foundation::core::ISize,
    image::{ColorSpace, ColorType, PlatformTraits, TextureAddressing},
};

/// How an external texture is identified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureHandle {
    /// Integer texture name.
    Id(u64),
    /// Native object pointer encoded as an integer.
    Pointer(u64),
}

impl TextureHandle {
    /// Raw integer value of the handle.
    pub fn raw(self) -> u64 {
        match self {
            Self::Id(v) | Self::Pointer(v) => v,
        }
    }

    /// Addressing convention of this handle.
    pub fn addressing(self) -> TextureAddressing {
        match self {
            Self::Id(_) => TextureAddressing::Id,
            Self::Pointer(_) => TextureAddressing::Pointer,
        }
    }
}

/// Where row zero of a texture lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceOrigin {
    /// Row zero is the top row.
    TopLeft,
    /// Row zero is the bottom row (GL framebuffer convention).
    BottomLeft,
}

/// Alpha convention of texture contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaType {
    /// Color channels are premultiplied by alpha.
    Premul,
    /// Color channels are straight.
    Unpremul,
}

/// What a texture binding is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureUsage {
    /// Sampled as an image.
    Sample,
    /// Rendered into as a surface.
    RenderTarget,
}

/// Description of an externally owned texture.
///
/// Decoded from the wire shape `[mode, handle, width, height, pixel_format]`: mode `0` is
/// id-addressed, mode `1` pointer-addressed; pixel format `0` is RGBA-8888, `1` is
/// BGRA-8888, anything else maps to [`ColorType::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TextureDescriptor {
    handle: TextureHandle,
    size: ISize,
    color_type: ColorType,
}

impl TextureDescriptor {
    /// Create a descriptor directly.
    pub fn new(handle: TextureHandle, size: ISize, color_type: ColorType) -> Self {
        Self {
            handle,
            size,
            color_type,
        }
    }

    /// Decode the integer wire shape.
    ///
    /// Returns `None` for a sequence of the wrong arity, an unknown mode, or a negative or
    /// out-of-range handle or dimension.
    pub fn from_raw(raw: &[i64]) -> Option<Self> {
        let &[mode, handle, width, height, format] = raw else {
            return None;
        };
        let handle = u64::try_from(handle).ok()?;
        let handle = match mode {
            0 => TextureHandle::Id(handle),
            1 => TextureHandle::Pointer(handle),
            _ => return None,
        };
        let size = ISize::new(u32::try_from(width).ok()?, u32::try_from(height).ok()?);
        let color_type = match format {
            0 => ColorType::Rgba8888,
            1 => ColorType::Bgra8888,
            _ => ColorType::Unknown,
        };
        Some(Self::new(handle, size, color_type))
    }

    /// Texture handle.
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Texture size in pixels.
    pub fn size(&self) -> ISize {
        self.size
    }

    /// Declared pixel layout.
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    /// Resolve how the backend should bind this texture on the given platform.
    ///
    /// Sampled textures use the platform's assumed pixel layout with a top-left origin.
    /// Id-addressed render targets follow the GL framebuffer convention (bottom-left origin,
    /// plain 2D target).
    pub fn backend_binding(
        &self,
        traits: &PlatformTraits,
        usage: TextureUsage,
    ) -> BackendTextureBinding {
        let is_id = matches!(self.handle, TextureHandle::Id(_));
        let (gl_target, origin) = match (is_id, usage) {
            (true, TextureUsage::Sample) => (Some(traits.sample_target), SurfaceOrigin::TopLeft),
            (true, TextureUsage::RenderTarget) => {
                (Some(traits.render_target), SurfaceOrigin::BottomLeft)
            }
            (false, _) => (None, SurfaceOrigin::TopLeft),
        };
        BackendTextureBinding {
            handle: self.handle,
            size: self.size,
            gl_target,
            gl_format: is_id.then_some(traits.gl_format),
            color_type: traits.assumed_color_type,
            origin,
            alpha: AlphaType::Premul,
            color_space: traits.color_space,
        }
    }
}

/// Everything a backend needs to import an external texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BackendTextureBinding {
    /// Texture handle.
    pub handle: TextureHandle,
    /// Texture size in pixels.
    pub size: ISize,
    /// GL target for id-addressed textures.
    pub gl_target: Option<u32>,
    /// GL internal format for id-addressed textures.
    pub gl_format: Option<u32>,
    /// Pixel layout assumed by the backend.
    pub color_type: ColorType,
    /// Row-zero convention.
    pub origin: SurfaceOrigin,
    /// Alpha convention.
    pub alpha: AlphaType,
    /// Color space tag.
    pub color_space: ColorSpace,
}

#[cfg(test)]
#[path = "../../tests/unit/image/texture_descriptor.rs"]
mod tests;
