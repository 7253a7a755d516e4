//! Portable images and external-texture descriptions.

mod platform;
mod portable;
mod texture_descriptor;

pub use platform::{ColorSpace, ColorType, PlatformTraits, TextureAddressing};
pub use portable::{PortableImage, TextureSource};
pub use texture_descriptor::{
    AlphaType, BackendTextureBinding, SurfaceOrigin, TextureDescriptor, TextureHandle,
    TextureUsage,
};
