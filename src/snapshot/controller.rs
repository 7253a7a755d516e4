use std::sync::{Arc, RwLock};

use crate::{
    foundation::core::{Affine, ISize, LayerPaint, Point},
    image::{
        ColorType, PlatformTraits, PortableImage, TextureAddressing, TextureDescriptor,
        TextureHandle, TextureUsage,
    },
    paint::{Canvas, DisplayList},
    render::{GpuContext, RenderTargetFactory, Surface, cpu::CpuRasterFactory},
};

use super::switch::GpuDisabledSwitch;

/// Creates a short-lived offscreen context when no onscreen surface exists.
pub trait SnapshotSurfaceProducer: Send + Sync {
    fn create_snapshot_context(&self) -> Option<Arc<dyn GpuContext>>;
}

impl<F> SnapshotSurfaceProducer for F
where
    F: Fn() -> Option<Arc<dyn GpuContext>> + Send + Sync,
{
    fn create_snapshot_context(&self) -> Option<Arc<dyn GpuContext>> {
        self()
    }
}

/// What the snapshot controller needs from the rasterizer.
pub trait SnapshotDelegate: Send + Sync {
    /// Context of the onscreen surface, if one is set up.
    fn onscreen_context(&self) -> Option<Arc<dyn GpuContext>>;

    /// Fallback producer used when there is no onscreen context.
    fn snapshot_surface_producer(&self) -> Option<&dyn SnapshotSurfaceProducer> {
        None
    }

    fn gpu_disabled_switch(&self) -> &GpuDisabledSwitch;
}

/// Ready-made [`SnapshotDelegate`] whose onscreen context can be swapped as surfaces come
/// and go.
#[derive(Default)]
pub struct SnapshotSources {
    onscreen: RwLock<Option<Arc<dyn GpuContext>>>,
    producer: Option<Box<dyn SnapshotSurfaceProducer>>,
    switch: GpuDisabledSwitch,
}

impl std::fmt::Debug for SnapshotSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSources")
            .field("has_onscreen", &self.onscreen_context().is_some())
            .field("has_producer", &self.producer.is_some())
            .field("switch", &self.switch)
            .finish()
    }
}

impl SnapshotSources {
    pub fn new(switch: GpuDisabledSwitch) -> Self {
        Self {
            onscreen: RwLock::new(None),
            producer: None,
            switch,
        }
    }

    pub fn with_onscreen_context(self, context: Arc<dyn GpuContext>) -> Self {
        self.set_onscreen_context(Some(context));
        self
    }

    pub fn with_surface_producer(
        mut self,
        producer: impl SnapshotSurfaceProducer + 'static,
    ) -> Self {
        self.producer = Some(Box::new(producer));
        self
    }

    /// Replace the onscreen context (`None` when the surface is torn down).
    pub fn set_onscreen_context(&self, context: Option<Arc<dyn GpuContext>>) {
        match self.onscreen.write() {
            Ok(mut slot) => *slot = context,
            Err(poisoned) => *poisoned.into_inner() = context,
        }
    }
}

impl SnapshotDelegate for SnapshotSources {
    fn onscreen_context(&self) -> Option<Arc<dyn GpuContext>> {
        match self.onscreen.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn snapshot_surface_producer(&self) -> Option<&dyn SnapshotSurfaceProducer> {
        self.producer.as_deref()
    }

    fn gpu_disabled_switch(&self) -> &GpuDisabledSwitch {
        &self.switch
    }
}

/// Turns display lists and external textures into [`PortableImage`]s.
///
/// Every operation returns `None` when no image can be produced (no context, allocation
/// failure, empty or unsupported request). Callers decide whether to retry, e.g. at a
/// smaller size.
pub struct SnapshotController {
    delegate: Arc<dyn SnapshotDelegate>,
    platform: PlatformTraits,
    software: CpuRasterFactory,
}

impl std::fmt::Debug for SnapshotController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotController")
            .field("platform", &self.platform.name)
            .field("software", &self.software)
            .finish()
    }
}

impl SnapshotController {
    pub fn new(delegate: Arc<dyn SnapshotDelegate>, platform: PlatformTraits) -> Self {
        Self {
            delegate,
            platform,
            software: CpuRasterFactory::new(),
        }
    }

    /// Limit software snapshots to `max_dimension` pixels per axis.
    pub fn with_software_max_dimension(mut self, max_dimension: u32) -> Self {
        self.software = CpuRasterFactory::with_max_dimension(max_dimension);
        self
    }

    pub fn platform(&self) -> &PlatformTraits {
        &self.platform
    }

    pub fn delegate(&self) -> &Arc<dyn SnapshotDelegate> {
        &self.delegate
    }

    /// Render `list` into a host-memory image of `size` pixels.
    ///
    /// Requests larger than the render-target limit are uniformly downscaled so the longer
    /// side fits.
    #[tracing::instrument(skip_all, fields(width = size.width, height = size.height))]
    pub fn make_raster_snapshot(&self, list: &DisplayList, size: ISize) -> Option<PortableImage> {
        self.render_snapshot(size, |canvas| canvas.draw_display_list(list, 1.0))
    }

    /// Copy `image` into host memory through the onscreen context.
    ///
    /// `None` without an onscreen context; the caller has to convert on another thread.
    pub fn convert_to_raster_image(&self, image: &PortableImage) -> Option<PortableImage> {
        if self.delegate.onscreen_context().is_none() {
            tracing::debug!("no onscreen context; raster conversion deferred to caller");
            return None;
        }
        self.render_snapshot(image.size(), |canvas| {
            canvas.draw_image(image, Point::ORIGIN, LayerPaint::OPAQUE)
        })
    }

    /// Wrap the external texture described by `descriptor` as an image.
    pub fn make_from_texture(&self, descriptor: &TextureDescriptor) -> Option<PortableImage> {
        if descriptor.color_type() == ColorType::Unknown {
            tracing::warn!(
                handle = ?descriptor.handle(),
                "texture has an unsupported pixel format"
            );
            return None;
        }
        if descriptor.size().is_empty() {
            tracing::warn!(handle = ?descriptor.handle(), "texture has an empty size");
            return None;
        }
        let Some(context) = self.delegate.onscreen_context() else {
            tracing::warn!("no onscreen context to import the texture into");
            return None;
        };
        let binding = descriptor.backend_binding(&self.platform, TextureUsage::Sample);
        let image = context.import_texture(&binding);
        if image.is_none() {
            tracing::warn!(
                handle = ?descriptor.handle(),
                backend = context.name(),
                "texture import failed"
            );
        }
        image
    }

    /// [`make_from_texture`] for a bare handle, addressed and formatted the platform way.
    ///
    /// [`make_from_texture`]: SnapshotController::make_from_texture
    pub fn make_from_raw_texture(&self, raw: u64, size: ISize) -> Option<PortableImage> {
        self.make_from_texture(&self.platform_descriptor(raw, size))
    }

    /// Surface rendering into the external texture described by `descriptor`, for drawing
    /// many frames into it.
    pub fn make_offscreen_surface(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Option<Box<dyn Surface>> {
        if descriptor.size().is_empty() {
            tracing::warn!(
                handle = ?descriptor.handle(),
                "offscreen surface requested with an empty size"
            );
            return None;
        }
        let Some(context) = self.delegate.onscreen_context() else {
            tracing::warn!("no onscreen context to bind the offscreen surface to");
            return None;
        };
        let binding = descriptor.backend_binding(&self.platform, TextureUsage::RenderTarget);
        let surface = context.make_surface_from_texture(&binding);
        if surface.is_none() {
            tracing::warn!(
                handle = ?descriptor.handle(),
                backend = context.name(),
                "offscreen surface creation failed"
            );
        }
        surface
    }

    /// Descriptor for a bare handle on this platform.
    pub fn platform_descriptor(&self, raw: u64, size: ISize) -> TextureDescriptor {
        let handle = match self.platform.addressing {
            TextureAddressing::Id => TextureHandle::Id(raw),
            TextureAddressing::Pointer => TextureHandle::Pointer(raw),
        };
        TextureDescriptor::new(handle, size, self.platform.assumed_color_type)
    }

    fn snapshot_context(&self) -> Option<Arc<dyn GpuContext>> {
        if let Some(context) = self.delegate.onscreen_context().filter(|c| c.is_valid()) {
            return Some(context);
        }
        self.delegate
            .snapshot_surface_producer()
            .and_then(|p| p.create_snapshot_context())
            .filter(|c| c.is_valid())
    }

    fn render_snapshot(
        &self,
        size: ISize,
        draw: impl FnOnce(&mut dyn Canvas),
    ) -> Option<PortableImage> {
        if size.is_empty() {
            tracing::warn!(?size, "snapshot requested with an empty size");
            return None;
        }
        let gpu = self
            .snapshot_context()
            .filter(|_| !self.delegate.gpu_disabled_switch().is_disabled());
        let image = match gpu {
            Some(context) => {
                if !context.make_current() {
                    tracing::warn!(
                        backend = context.name(),
                        "could not make the snapshot context current"
                    );
                    return None;
                }
                draw_snapshot(context.as_ref(), size, draw)
            }
            // Software rendering, or GPU snapshots switched off.
            None => draw_snapshot(&self.software, size, draw),
        };
        if image.is_none() {
            tracing::warn!(?size, "snapshot produced no image");
        }
        image
    }
}

/// Draw into a target from `targets`, downscaled to its size limit, and read the result
/// back into host memory.
fn draw_snapshot(
    targets: &dyn RenderTargetFactory,
    size: ISize,
    draw: impl FnOnce(&mut dyn Canvas),
) -> Option<PortableImage> {
    let max = targets.max_render_target_size();
    let scale = (f64::from(max) / f64::from(size.max_dimension())).min(1.0);
    let target_size = if scale < 1.0 { size.scaled(scale) } else { size };
    let Some(mut target) = targets.make_render_target(target_size) else {
        tracing::error!(?target_size, "snapshot could not create a render target");
        return None;
    };
    {
        let canvas = target.canvas();
        if scale < 1.0 {
            canvas.concat(Affine::scale(scale));
        }
        draw(canvas);
        canvas.flush();
    }
    target.snapshot()?.make_raster_image()
}

#[cfg(test)]
#[path = "../../tests/unit/snapshot/controller.rs"]
mod tests;
