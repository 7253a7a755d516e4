use std::sync::Arc;

use crate::{
    foundation::core::{Affine, ISize, Rect},
    image::PortableImage,
    paint::Canvas,
    render::{GpuContext, RenderTarget},
};

/// Persistent render destination: the onscreen swapchain or an external texture.
pub trait Surface: Send {
    /// Return `false` when the surface can no longer be drawn into (e.g. context loss).
    fn is_valid(&self) -> bool;

    /// Pixel size of the surface.
    fn size(&self) -> ISize;

    /// Begin drawing the next frame.
    ///
    /// With `repaint: None` the frame starts out transparent. With `Some(rect)` the frame
    /// starts out holding the previously submitted contents everywhere except inside `rect`
    /// (device pixels), which is transparent, so callers doing partial repaint only need to
    /// redraw that rect.
    fn acquire_frame(&mut self, repaint: Option<Rect>) -> Option<SurfaceFrame<'_>>;

    /// Transform from surface coordinates to device coordinates.
    fn root_transformation(&self) -> Affine {
        Affine::IDENTITY
    }

    /// Graphics context backing the surface, if any.
    ///
    /// The handle shares the backend context; it does not keep the surface alive.
    fn context(&self) -> Option<Arc<dyn GpuContext>>;

    /// Backend-canonical handle of the surface's render target.
    fn backend_handle(&self) -> Option<u64> {
        None
    }

    /// Most recently submitted contents.
    fn snapshot(&self) -> Option<PortableImage>;
}

/// One frame being drawn into a [`Surface`].
pub struct SurfaceFrame<'a> {
    target: Box<dyn RenderTarget>,
    supports_readback: bool,
    on_submit: Box<dyn FnOnce(PortableImage) -> bool + 'a>,
}

impl<'a> SurfaceFrame<'a> {
    /// Wrap a render target; `on_submit` receives the rendered image.
    pub fn new(
        target: Box<dyn RenderTarget>,
        supports_readback: bool,
        on_submit: impl FnOnce(PortableImage) -> bool + 'a,
    ) -> Self {
        Self {
            target,
            supports_readback,
            on_submit: Box::new(on_submit),
        }
    }

    /// Canvas for this frame.
    pub fn canvas(&mut self) -> &mut dyn Canvas {
        self.target.canvas()
    }

    /// Pixel size of the frame.
    pub fn size(&self) -> ISize {
        self.target.size()
    }

    /// Return `true` when the frame's pixels can be read back after submission.
    pub fn supports_readback(&self) -> bool {
        self.supports_readback
    }

    /// Flush drawing and present it to the surface. Returns `false` on failure.
    pub fn submit(self) -> bool {
        let Self {
            target, on_submit, ..
        } = self;
        match target.snapshot() {
            Some(image) => on_submit(image),
            None => {
                tracing::warn!("surface frame produced no image");
                false
            }
        }
    }
}

/// Copy of `prev` with the pixels inside `hole` made transparent.
///
/// Used by surfaces to seed a partial-repaint frame with their retained contents.
pub(crate) fn retained_background(prev: &PortableImage, hole: Rect) -> Option<PortableImage> {
    let mut data = prev.rgba8_premul()?;
    let size = prev.size();
    let hole = crate::geometry::intersect_nonempty(crate::geometry::round_out(hole), size.to_rect());
    if hole.area() > 0.0 {
        let row_bytes = size.width as usize * 4;
        let (x0, x1) = (hole.x0 as usize * 4, hole.x1 as usize * 4);
        for y in hole.y0 as usize..hole.y1 as usize {
            let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
            row[x0..x1].fill(0);
        }
    }
    PortableImage::from_rgba8_premul(size, &data).ok()
}
