//! Render targets, surfaces, and backend graphics contexts.
//!
//! A [`GpuContext`] owns a device and hands out render targets and surfaces that hold a
//! non-owning view of it. When the context is lost every derived surface reports
//! `is_valid() == false` until it is recreated.
//!
//! Backends:
//! - [`cpu`]: `vello_cpu` software targets (always available).
//! - [`headless`]: CPU-backed emulation of a GPU context with an external texture registry.
//! - `gpu` (feature `gpu`): `vello` + `wgpu` render targets with readback.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod headless;
mod surface;

pub use surface::{Surface, SurfaceFrame};

use crate::{
    foundation::core::ISize,
    image::{BackendTextureBinding, PortableImage},
    paint::Canvas,
};

/// Offscreen drawing destination producing a single image.
pub trait RenderTarget: Send {
    /// Pixel size of the target.
    fn size(&self) -> ISize;

    /// Canvas drawing into this target.
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Finish drawing and return the rendered pixels.
    ///
    /// GPU backends may return a texture-backed image.
    fn snapshot(self: Box<Self>) -> Option<PortableImage>;
}

/// Creates [`RenderTarget`]s.
pub trait RenderTargetFactory: Send + Sync {
    /// Largest width or height a render target may have.
    fn max_render_target_size(&self) -> u32;

    /// Allocate a target of `size` pixels; `None` on empty, oversized, or failed allocation.
    fn make_render_target(&self, size: ISize) -> Option<Box<dyn RenderTarget>>;
}

/// Backend graphics context (device and queue).
pub trait GpuContext: RenderTargetFactory {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Return `false` once the context has been lost.
    fn is_valid(&self) -> bool;

    /// Bind the context to the calling thread. Returns `false` on failure.
    fn make_current(&self) -> bool;

    /// Wrap an externally owned texture as an image.
    fn import_texture(&self, binding: &BackendTextureBinding) -> Option<PortableImage>;

    /// Create a surface rendering into an externally owned texture.
    fn make_surface_from_texture(&self, binding: &BackendTextureBinding)
    -> Option<Box<dyn Surface>>;
}
