//! CPU-backed emulation of a GPU context.
//!
//! `HeadlessContext` behaves like a device-owning backend without needing a GPU: render
//! targets produce texture-backed images that must be read back, external textures live in a
//! registry keyed by handle, surfaces bound to external textures get driver-assigned
//! framebuffer handles, and the whole context can be "lost" to exercise invalidation paths.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use crate::{
    foundation::core::{ISize, LayerPaint, Point, Rect},
    image::{BackendTextureBinding, ColorType, PortableImage, TextureHandle, TextureSource},
    paint::Canvas,
    render::{
        GpuContext, RenderTarget, RenderTargetFactory, Surface, SurfaceFrame,
        cpu::{CPU_MAX_DIMENSION, CpuRenderTarget},
        surface::retained_background,
    },
};

/// First framebuffer handle handed out; keeps handles visibly distinct from texture ids.
const FIRST_FRAMEBUFFER_HANDLE: u64 = 0x1000;

#[derive(Debug)]
struct TextureEntry {
    size: ISize,
    /// Premultiplied pixels in `layout` order.
    pixels: Mutex<Vec<u8>>,
    layout: ColorType,
}

#[derive(Debug)]
struct Shared {
    max_dimension: u32,
    valid: AtomicBool,
    make_current_fails: AtomicBool,
    textures: Mutex<HashMap<TextureHandle, Arc<TextureEntry>>>,
    next_framebuffer: AtomicU64,
    render_targets_created: AtomicUsize,
}

impl Shared {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn texture(&self, handle: TextureHandle) -> Option<Arc<TextureEntry>> {
        let textures = self.textures.lock().ok()?;
        textures.get(&handle).cloned()
    }
}

/// Emulated GPU context. Clones share the same device state.
#[derive(Clone, Debug)]
pub struct HeadlessContext {
    shared: Arc<Shared>,
}

impl HeadlessContext {
    /// Create a context whose render targets are limited to `max_dimension` pixels per axis.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_dimension: max_dimension.clamp(1, CPU_MAX_DIMENSION),
                valid: AtomicBool::new(true),
                make_current_fails: AtomicBool::new(false),
                textures: Mutex::new(HashMap::new()),
                next_framebuffer: AtomicU64::new(FIRST_FRAMEBUFFER_HANDLE),
                render_targets_created: AtomicUsize::new(0),
            }),
        }
    }

    /// Register an externally owned texture, as a platform texture registry would.
    ///
    /// `pixels` are premultiplied and laid out as `layout` (RGBA or BGRA); `None` creates a
    /// transparent texture.
    pub fn register_texture(
        &self,
        handle: TextureHandle,
        size: ISize,
        layout: ColorType,
        pixels: Option<Vec<u8>>,
    ) -> bool {
        let pixels = pixels.unwrap_or_else(|| vec![0; size.rgba8_byte_len()]);
        if pixels.len() != size.rgba8_byte_len() || layout == ColorType::Unknown {
            return false;
        }
        let Ok(mut textures) = self.shared.textures.lock() else {
            return false;
        };
        textures.insert(
            handle,
            Arc::new(TextureEntry {
                size,
                pixels: Mutex::new(pixels),
                layout,
            }),
        );
        true
    }

    /// Remove a texture from the registry.
    pub fn unregister_texture(&self, handle: TextureHandle) {
        if let Ok(mut textures) = self.shared.textures.lock() {
            textures.remove(&handle);
        }
    }

    /// Current pixels of a registered texture, converted to premultiplied RGBA.
    pub fn texture_pixels(&self, handle: TextureHandle) -> Option<Vec<u8>> {
        let entry = self.shared.texture(handle)?;
        read_entry(&entry)
    }

    /// Simulate device loss; derived surfaces and texture images become invalid.
    pub fn lose_context(&self) {
        self.shared.valid.store(false, Ordering::Release);
    }

    /// Make subsequent `make_current` calls fail (or succeed again).
    pub fn set_make_current_fails(&self, fails: bool) {
        self.shared.make_current_fails.store(fails, Ordering::Release);
    }

    /// Number of render targets allocated so far.
    pub fn render_targets_created(&self) -> usize {
        self.shared.render_targets_created.load(Ordering::Relaxed)
    }
}

impl RenderTargetFactory for HeadlessContext {
    fn max_render_target_size(&self) -> u32 {
        self.shared.max_dimension
    }

    fn make_render_target(&self, size: ISize) -> Option<Box<dyn RenderTarget>> {
        if !self.shared.is_valid() {
            tracing::warn!("render target requested on a lost context");
            return None;
        }
        if size.max_dimension() > self.shared.max_dimension {
            tracing::warn!(?size, max = self.shared.max_dimension, "render target too large");
            return None;
        }
        let inner = CpuRenderTarget::new(size)?;
        self.shared
            .render_targets_created
            .fetch_add(1, Ordering::Relaxed);
        Some(Box::new(HeadlessRenderTarget {
            inner,
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl GpuContext for HeadlessContext {
    fn name(&self) -> &str {
        "headless"
    }

    fn is_valid(&self) -> bool {
        self.shared.is_valid()
    }

    fn make_current(&self) -> bool {
        self.shared.is_valid() && !self.shared.make_current_fails.load(Ordering::Acquire)
    }

    fn import_texture(&self, binding: &BackendTextureBinding) -> Option<PortableImage> {
        if !self.shared.is_valid() || binding.color_type == ColorType::Unknown {
            return None;
        }
        let Some(entry) = self.shared.texture(binding.handle) else {
            tracing::warn!(handle = ?binding.handle, "texture is not registered");
            return None;
        };
        if entry.size != binding.size {
            tracing::warn!(
                handle = ?binding.handle,
                registered = ?entry.size,
                requested = ?binding.size,
                "texture size mismatch"
            );
            return None;
        }
        Some(PortableImage::from_texture(Arc::new(HeadlessTexture {
            handle: binding.handle.raw(),
            size: entry.size,
            content: TextureContent::External(entry),
            shared: Arc::clone(&self.shared),
        })))
    }

    fn make_surface_from_texture(
        &self,
        binding: &BackendTextureBinding,
    ) -> Option<Box<dyn Surface>> {
        if !self.shared.is_valid() {
            return None;
        }
        let entry = self.shared.texture(binding.handle)?;
        if entry.size != binding.size || binding.size.max_dimension() > self.shared.max_dimension
        {
            return None;
        }
        let framebuffer = self.shared.next_framebuffer.fetch_add(1, Ordering::Relaxed);
        Some(Box::new(HeadlessTextureSurface {
            context: self.clone(),
            entry,
            framebuffer,
        }))
    }
}

#[derive(Debug)]
enum TextureContent {
    Rendered(Vec<u8>),
    External(Arc<TextureEntry>),
}

#[derive(Debug)]
struct HeadlessTexture {
    handle: u64,
    size: ISize,
    content: TextureContent,
    shared: Arc<Shared>,
}

impl TextureSource for HeadlessTexture {
    fn size(&self) -> ISize {
        self.size
    }

    fn read_pixels(&self) -> Option<Vec<u8>> {
        if !self.shared.is_valid() {
            return None;
        }
        match &self.content {
            TextureContent::Rendered(pixels) => Some(pixels.clone()),
            TextureContent::External(entry) => read_entry(entry),
        }
    }

    fn backend_handle(&self) -> u64 {
        self.handle
    }
}

struct HeadlessRenderTarget {
    inner: CpuRenderTarget,
    shared: Arc<Shared>,
}

impl RenderTarget for HeadlessRenderTarget {
    fn size(&self) -> ISize {
        self.inner.size()
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        self.inner.canvas()
    }

    fn snapshot(self: Box<Self>) -> Option<PortableImage> {
        let Self { inner, shared } = *self;
        if !shared.is_valid() {
            return None;
        }
        let size = inner.size();
        let pixmap = inner.into_pixmap();
        let handle = shared.next_framebuffer.fetch_add(1, Ordering::Relaxed);
        Some(PortableImage::from_texture(Arc::new(HeadlessTexture {
            handle,
            size,
            content: TextureContent::Rendered(pixmap.data_as_u8_slice().to_vec()),
            shared,
        })))
    }
}

/// Surface drawing into a registered external texture.
#[derive(Debug)]
struct HeadlessTextureSurface {
    context: HeadlessContext,
    entry: Arc<TextureEntry>,
    framebuffer: u64,
}

impl Surface for HeadlessTextureSurface {
    fn is_valid(&self) -> bool {
        self.context.shared.is_valid()
    }

    fn size(&self) -> ISize {
        self.entry.size
    }

    fn acquire_frame(&mut self, repaint: Option<Rect>) -> Option<SurfaceFrame<'_>> {
        if !self.is_valid() {
            return None;
        }
        let mut target = CpuRenderTarget::new(self.entry.size)?;
        if let Some(hole) = repaint {
            let prev = read_entry(&self.entry)
                .and_then(|px| PortableImage::from_rgba8_premul(self.entry.size, &px).ok());
            if let Some(bg) = prev.and_then(|prev| retained_background(&prev, hole)) {
                target.canvas().draw_image(&bg, Point::ORIGIN, LayerPaint::OPAQUE);
            }
        }
        let entry = Arc::clone(&self.entry);
        let shared = Arc::clone(&self.context.shared);
        Some(SurfaceFrame::new(Box::new(target), true, move |image| {
            if !shared.is_valid() {
                return false;
            }
            let Some(mut pixels) = image.rgba8_premul() else {
                return false;
            };
            if entry.layout == ColorType::Bgra8888 {
                swap_red_blue(&mut pixels);
            }
            match entry.pixels.lock() {
                Ok(mut dst) => {
                    *dst = pixels;
                    true
                }
                Err(_) => false,
            }
        }))
    }

    fn context(&self) -> Option<Arc<dyn GpuContext>> {
        Some(Arc::new(self.context.clone()))
    }

    fn backend_handle(&self) -> Option<u64> {
        Some(self.framebuffer)
    }

    fn snapshot(&self) -> Option<PortableImage> {
        let pixels = read_entry(&self.entry)?;
        PortableImage::from_rgba8_premul(self.entry.size, &pixels).ok()
    }
}

fn read_entry(entry: &TextureEntry) -> Option<Vec<u8>> {
    let mut pixels = entry.pixels.lock().ok()?.clone();
    if entry.layout == ColorType::Bgra8888 {
        swap_red_blue(&mut pixels);
    }
    Some(pixels)
}

fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/headless.rs"]
mod tests;
