//! `vello` + `wgpu` GPU context.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use vello::peniko::{Compose, Fill, Mix};

use crate::{
    foundation::{
        core::{Affine, BlendMode, ISize, LayerPaint, Point, Rect, Rgba8},
        error::{LaminateError, LaminateResult},
    },
    image::{BackendTextureBinding, ColorType, PortableImage, TextureHandle, TextureSource},
    paint::{Canvas, DisplayList, DrawOp},
    render::{
        GpuContext, RenderTarget, RenderTargetFactory, Surface, SurfaceFrame,
        surface::retained_background,
    },
};

struct WgpuInner {
    device: vello::wgpu::Device,
    queue: vello::wgpu::Queue,
    renderer: Mutex<vello::Renderer>,
    max_dimension: u32,
    valid: AtomicBool,
    textures: Mutex<HashMap<TextureHandle, vello::wgpu::Texture>>,
}

impl WgpuInner {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn create_texture(&self, size: ISize) -> vello::wgpu::Texture {
        self.device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("laminate_render_target"),
            size: vello::wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::TEXTURE_BINDING
                | vello::wgpu::TextureUsages::COPY_SRC
                | vello::wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn render_scene(
        &self,
        scene: &vello::Scene,
        texture: &vello::wgpu::Texture,
        size: ISize,
    ) -> LaminateResult<()> {
        let view = texture.create_view(&vello::wgpu::TextureViewDescriptor::default());
        let mut renderer = self
            .renderer
            .lock()
            .map_err(|_| LaminateError::backend("vello renderer lock poisoned"))?;
        renderer
            .render_to_texture(
                &self.device,
                &self.queue,
                scene,
                &view,
                &vello::RenderParams {
                    base_color: vello::peniko::Color::from_rgba8(0, 0, 0, 0),
                    width: size.width,
                    height: size.height,
                    antialiasing_method: vello::AaConfig::Area,
                },
            )
            .map_err(|e| LaminateError::backend(format!("vello render failed: {e:?}")))
    }

    fn read_texture(&self, texture: &vello::wgpu::Texture, size: ISize) -> LaminateResult<Vec<u8>> {
        let bytes_per_row_unpadded = size
            .width
            .checked_mul(4)
            .ok_or_else(|| LaminateError::backend("readback width overflow"))?;
        let bytes_per_row = align_to(
            bytes_per_row_unpadded,
            vello::wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let buffer_size = u64::from(bytes_per_row)
            .checked_mul(u64::from(size.height))
            .ok_or_else(|| LaminateError::backend("readback buffer size overflow"))?;
        let readback = self.device.create_buffer(&vello::wgpu::BufferDescriptor {
            label: Some("laminate_readback"),
            size: buffer_size,
            usage: vello::wgpu::BufferUsages::MAP_READ | vello::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.device
                .create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                    label: Some("laminate_readback_encoder"),
                });
        encoder.copy_texture_to_buffer(
            vello::wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: vello::wgpu::Origin3d::ZERO,
                aspect: vello::wgpu::TextureAspect::All,
            },
            vello::wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: vello::wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            vello::wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(vello::wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(vello::wgpu::PollType::wait_indefinitely())
            .map_err(|e| LaminateError::backend(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| LaminateError::backend("readback channel closed"))?
            .map_err(|e| LaminateError::backend(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = size.width as usize * 4;
        let padded_row_bytes = bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * size.height as usize);
        for row in 0..size.height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();
        Ok(out)
    }

    fn write_texture(&self, texture: &vello::wgpu::Texture, size: ISize, rgba8_premul: &[u8]) {
        self.queue.write_texture(
            vello::wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: vello::wgpu::Origin3d::ZERO,
                aspect: vello::wgpu::TextureAspect::All,
            },
            rgba8_premul,
            vello::wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            vello::wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// GPU context rendering with `vello` on a `wgpu` device.
#[derive(Clone)]
pub struct WgpuContext {
    inner: Arc<WgpuInner>,
}

impl WgpuContext {
    /// Open the default adapter and create a device, queue, and vello renderer.
    #[tracing::instrument]
    pub fn new() -> LaminateResult<Self> {
        let instance = vello::wgpu::Instance::new(&vello::wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(
            &vello::wgpu::RequestAdapterOptions {
                power_preference: vello::wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| match e {
            vello::wgpu::RequestAdapterError::NotFound { .. } => {
                LaminateError::backend("no gpu adapter available")
            }
            other => LaminateError::backend(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&vello::wgpu::DeviceDescriptor {
                label: None,
                required_features: vello::wgpu::Features::empty(),
                required_limits: vello::wgpu::Limits::default(),
                experimental_features: vello::wgpu::ExperimentalFeatures::default(),
                memory_hints: vello::wgpu::MemoryHints::Performance,
                trace: vello::wgpu::Trace::Off,
            }))
            .map_err(|e| LaminateError::backend(format!("wgpu request_device failed: {e:?}")))?;

        let renderer = vello::Renderer::new(&device, vello::RendererOptions::default())
            .map_err(|e| LaminateError::backend(format!("vello renderer init failed: {e:?}")))?;
        let max_dimension = device.limits().max_texture_dimension_2d;

        tracing::info!(max_dimension, "wgpu context ready");
        Ok(Self {
            inner: Arc::new(WgpuInner {
                device,
                queue,
                renderer: Mutex::new(renderer),
                max_dimension,
                valid: AtomicBool::new(true),
                textures: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Create a texture on this device and register it as an external texture.
    pub fn create_external_texture(&self, handle: TextureHandle, size: ISize) -> bool {
        if size.is_empty() || size.max_dimension() > self.inner.max_dimension {
            return false;
        }
        let texture = self.inner.create_texture(size);
        match self.inner.textures.lock() {
            Ok(mut textures) => {
                textures.insert(handle, texture);
                true
            }
            Err(_) => false,
        }
    }

    /// Mark the context as lost; derived surfaces become invalid.
    pub fn invalidate(&self) {
        self.inner.valid.store(false, Ordering::Release);
    }

    fn external_texture(&self, binding: &BackendTextureBinding) -> Option<vello::wgpu::Texture> {
        let textures = self.inner.textures.lock().ok()?;
        let texture = textures.get(&binding.handle)?;
        let extent = texture.size();
        (extent.width == binding.size.width && extent.height == binding.size.height)
            .then(|| texture.clone())
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("max_dimension", &self.inner.max_dimension)
            .field("valid", &self.inner.is_valid())
            .finish()
    }
}

impl RenderTargetFactory for WgpuContext {
    fn max_render_target_size(&self) -> u32 {
        self.inner.max_dimension
    }

    fn make_render_target(&self, size: ISize) -> Option<Box<dyn RenderTarget>> {
        if !self.inner.is_valid() || size.is_empty() {
            return None;
        }
        if size.max_dimension() > self.inner.max_dimension {
            tracing::warn!(?size, max = self.inner.max_dimension, "render target too large");
            return None;
        }
        Some(Box::new(VelloRenderTarget {
            canvas: VelloCanvas::new(size),
            inner: Arc::clone(&self.inner),
        }))
    }
}

impl GpuContext for WgpuContext {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn make_current(&self) -> bool {
        // wgpu devices are not bound to threads.
        self.inner.is_valid()
    }

    fn import_texture(&self, binding: &BackendTextureBinding) -> Option<PortableImage> {
        if !self.inner.is_valid() || binding.color_type == ColorType::Unknown {
            return None;
        }
        let texture = self.external_texture(binding)?;
        Some(PortableImage::from_texture(Arc::new(WgpuTexture {
            handle: binding.handle.raw(),
            size: binding.size,
            texture,
            inner: Arc::clone(&self.inner),
        })))
    }

    fn make_surface_from_texture(
        &self,
        binding: &BackendTextureBinding,
    ) -> Option<Box<dyn Surface>> {
        if !self.inner.is_valid() {
            return None;
        }
        let texture = self.external_texture(binding)?;
        Some(Box::new(WgpuTextureSurface {
            context: self.clone(),
            handle: binding.handle.raw(),
            size: binding.size,
            texture,
        }))
    }
}

struct WgpuTexture {
    handle: u64,
    size: ISize,
    texture: vello::wgpu::Texture,
    inner: Arc<WgpuInner>,
}

impl std::fmt::Debug for WgpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuTexture")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .finish()
    }
}

impl TextureSource for WgpuTexture {
    fn size(&self) -> ISize {
        self.size
    }

    fn read_pixels(&self) -> Option<Vec<u8>> {
        if !self.inner.is_valid() {
            return None;
        }
        match self.inner.read_texture(&self.texture, self.size) {
            Ok(px) => Some(px),
            Err(err) => {
                tracing::warn!(%err, "wgpu texture readback failed");
                None
            }
        }
    }

    fn backend_handle(&self) -> u64 {
        self.handle
    }
}

struct VelloRenderTarget {
    canvas: VelloCanvas,
    inner: Arc<WgpuInner>,
}

impl RenderTarget for VelloRenderTarget {
    fn size(&self) -> ISize {
        self.canvas.size
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn snapshot(self: Box<Self>) -> Option<PortableImage> {
        let Self { mut canvas, inner } = *self;
        canvas.restore_all();
        let texture = inner.create_texture(canvas.size);
        if let Err(err) = inner.render_scene(&canvas.scene, &texture, canvas.size) {
            tracing::error!(%err, "gpu snapshot render failed");
            return None;
        }
        Some(PortableImage::from_texture(Arc::new(WgpuTexture {
            handle: 0,
            size: canvas.size,
            texture,
            inner,
        })))
    }
}

struct WgpuTextureSurface {
    context: WgpuContext,
    handle: u64,
    size: ISize,
    texture: vello::wgpu::Texture,
}

impl Surface for WgpuTextureSurface {
    fn is_valid(&self) -> bool {
        self.context.inner.is_valid()
    }

    fn size(&self) -> ISize {
        self.size
    }

    fn acquire_frame(&mut self, repaint: Option<Rect>) -> Option<SurfaceFrame<'_>> {
        let mut target = self.context.make_render_target(self.size)?;
        if let Some(hole) = repaint {
            if let Some(bg) = self.snapshot().and_then(|prev| retained_background(&prev, hole)) {
                target
                    .canvas()
                    .draw_image(&bg, Point::ORIGIN, LayerPaint::OPAQUE);
            }
        }
        let inner = Arc::clone(&self.context.inner);
        let texture = self.texture.clone();
        let size = self.size;
        Some(SurfaceFrame::new(target, true, move |image| {
            let Some(pixels) = image.rgba8_premul() else {
                return false;
            };
            inner.write_texture(&texture, size, &pixels);
            true
        }))
    }

    fn context(&self) -> Option<Arc<dyn GpuContext>> {
        Some(Arc::new(self.context.clone()))
    }

    fn backend_handle(&self) -> Option<u64> {
        Some(self.handle)
    }

    fn snapshot(&self) -> Option<PortableImage> {
        let pixels = self
            .context
            .inner
            .read_texture(&self.texture, self.size)
            .ok()?;
        PortableImage::from_rgba8_premul(self.size, &pixels).ok()
    }
}

#[derive(Clone, Copy)]
struct VelloState {
    transform: Affine,
    pushed_layers: u32,
}

/// [`Canvas`] encoding into a `vello::Scene`.
struct VelloCanvas {
    scene: vello::Scene,
    size: ISize,
    current: VelloState,
    stack: Vec<VelloState>,
}

impl VelloCanvas {
    fn new(size: ISize) -> Self {
        Self {
            scene: vello::Scene::new(),
            size,
            current: VelloState {
                transform: Affine::IDENTITY,
                pushed_layers: 0,
            },
            stack: Vec::new(),
        }
    }

    fn restore_all(&mut self) {
        while !self.stack.is_empty() {
            self.restore();
        }
        for _ in 0..self.current.pushed_layers {
            self.scene.pop_layer();
        }
        self.current.pushed_layers = 0;
    }

    fn push_layer(&mut self, blend: BlendMode, alpha: f32, transform: Affine, clip: Rect) {
        self.scene
            .push_layer(Fill::NonZero, blend_to_vello(blend), alpha, transform, &clip);
        self.current.pushed_layers += 1;
    }
}

impl Canvas for VelloCanvas {
    fn size(&self) -> ISize {
        self.size
    }

    fn save(&mut self) {
        self.stack.push(self.current);
        self.current.pushed_layers = 0;
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: LayerPaint) {
        self.save();
        match bounds {
            Some(b) => self.push_layer(paint.blend, paint.opacity, self.current.transform, b),
            None => self.push_layer(
                paint.blend,
                paint.opacity,
                Affine::IDENTITY,
                self.size.to_rect(),
            ),
        }
    }

    fn restore(&mut self) {
        let Some(prev) = self.stack.pop() else {
            return;
        };
        for _ in 0..self.current.pushed_layers {
            self.scene.pop_layer();
        }
        self.current = prev;
    }

    fn save_count(&self) -> usize {
        self.stack.len()
    }

    fn transform(&self) -> Affine {
        self.current.transform
    }

    fn set_transform(&mut self, transform: Affine) {
        self.current.transform = transform;
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.push_layer(BlendMode::SrcOver, 1.0, self.current.transform, rect);
    }

    fn draw_display_list(&mut self, list: &DisplayList, opacity: f32) {
        if opacity <= 0.0 {
            return;
        }
        for op in list.ops() {
            match op {
                DrawOp::FillRect { rect, color } => {
                    self.scene.fill(
                        Fill::NonZero,
                        self.current.transform,
                        color_to_vello(color.with_opacity(opacity)),
                        None,
                        rect,
                    );
                }
                DrawOp::FillPath { path, color } => {
                    self.scene.fill(
                        Fill::NonZero,
                        self.current.transform,
                        color_to_vello(color.with_opacity(opacity)),
                        None,
                        path,
                    );
                }
                DrawOp::DrawImage {
                    image,
                    at,
                    opacity: op_opacity,
                } => {
                    self.draw_image(image, *at, LayerPaint::with_opacity(op_opacity * opacity));
                }
            }
        }
    }

    fn draw_image(&mut self, image: &PortableImage, at: Point, paint: LayerPaint) {
        if paint.opacity <= 0.0 {
            return;
        }
        let Some(pixels) = image.rgba8_premul() else {
            tracing::warn!(id = image.unique_id(), "skipping unreadable image");
            return;
        };
        let data = vello::peniko::ImageData {
            data: vello::peniko::Blob::from(pixels),
            format: vello::peniko::ImageFormat::Rgba8,
            alpha_type: vello::peniko::ImageAlphaType::AlphaPremultiplied,
            width: image.width(),
            height: image.height(),
        };
        let transform = self.current.transform * Affine::translate(at.to_vec2());
        let needs_layer = !paint.is_identity();
        if needs_layer {
            self.save();
            let bounds = Rect::new(0.0, 0.0, f64::from(image.width()), f64::from(image.height()));
            self.push_layer(paint.blend, paint.opacity, transform, bounds);
        }
        self.scene.draw_image(&data, transform);
        if needs_layer {
            self.restore();
        }
    }

    fn flush(&mut self) {}
}

fn blend_to_vello(mode: BlendMode) -> vello::peniko::BlendMode {
    let (mix, compose) = match mode {
        BlendMode::SrcOver => (Mix::Normal, Compose::SrcOver),
        BlendMode::Src => (Mix::Normal, Compose::Copy),
        BlendMode::Plus => (Mix::Normal, Compose::Plus),
        BlendMode::Multiply => (Mix::Multiply, Compose::SrcOver),
        BlendMode::Screen => (Mix::Screen, Compose::SrcOver),
        BlendMode::Overlay => (Mix::Overlay, Compose::SrcOver),
        BlendMode::Darken => (Mix::Darken, Compose::SrcOver),
        BlendMode::Lighten => (Mix::Lighten, Compose::SrcOver),
        BlendMode::Difference => (Mix::Difference, Compose::SrcOver),
    };
    vello::peniko::BlendMode::new(mix, compose)
}

fn color_to_vello(c: Rgba8) -> vello::peniko::Color {
    vello::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
