//! Software render targets on `vello_cpu`.

use vello_cpu::kurbo::Shape as _;
use vello_cpu::peniko::{Compose, Mix};

use crate::{
    foundation::core::{Affine, BlendMode, ISize, LayerPaint, Point, Rect, Rgba8},
    image::PortableImage,
    paint::{Canvas, DisplayList, DrawOp},
    render::{
        GpuContext, RenderTarget, RenderTargetFactory, Surface, SurfaceFrame,
        surface::retained_background,
    },
};

/// Largest dimension `vello_cpu` pixmaps support.
pub const CPU_MAX_DIMENSION: u32 = u16::MAX as u32;

#[derive(Clone, Copy, Debug)]
struct CanvasState {
    transform: Affine,
    pushed_layers: u32,
}

/// [`Canvas`] drawing through a `vello_cpu::RenderContext`.
pub struct CpuCanvas {
    ctx: vello_cpu::RenderContext,
    size: ISize,
    current: CanvasState,
    stack: Vec<CanvasState>,
}

impl CpuCanvas {
    fn new(width: u16, height: u16) -> Self {
        Self {
            ctx: vello_cpu::RenderContext::new(width, height),
            size: ISize::new(u32::from(width), u32::from(height)),
            current: CanvasState {
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
            self.ctx.pop_layer();
        }
        self.current.pushed_layers = 0;
    }

    fn push_paint_layers(&mut self, paint: LayerPaint) {
        if !paint.blend.is_default() {
            self.ctx.push_blend_layer(blend_to_cpu(paint.blend));
            self.current.pushed_layers += 1;
        }
        if paint.opacity < 1.0 {
            self.ctx.push_opacity_layer(paint.opacity);
            self.current.pushed_layers += 1;
        }
    }

    fn fill_op(&mut self, op: &DrawOp, opacity: f32) {
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        match op {
            DrawOp::FillRect { rect, color } => {
                self.ctx.set_transform(affine_to_cpu(self.current.transform));
                self.ctx.set_paint(color_to_cpu(color.with_opacity(opacity)));
                self.ctx.fill_rect(&rect_to_cpu(*rect));
            }
            DrawOp::FillPath { path, color } => {
                self.ctx.set_transform(affine_to_cpu(self.current.transform));
                self.ctx.set_paint(color_to_cpu(color.with_opacity(opacity)));
                self.ctx.fill_path(&bezpath_to_cpu(path));
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

impl Canvas for CpuCanvas {
    fn size(&self) -> ISize {
        self.size
    }

    fn save(&mut self) {
        self.stack.push(self.current);
        self.current.pushed_layers = 0;
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: LayerPaint) {
        self.save();
        if let Some(bounds) = bounds {
            self.ctx.set_transform(affine_to_cpu(self.current.transform));
            self.ctx.push_clip_layer(&rect_to_cpu(bounds).to_path(0.1));
            self.current.pushed_layers += 1;
        }
        self.push_paint_layers(paint);
        if self.current.pushed_layers == 0 {
            self.ctx.push_opacity_layer(1.0);
            self.current.pushed_layers += 1;
        }
    }

    fn restore(&mut self) {
        let Some(prev) = self.stack.pop() else {
            return;
        };
        for _ in 0..self.current.pushed_layers {
            self.ctx.pop_layer();
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
        self.ctx.set_transform(affine_to_cpu(self.current.transform));
        self.ctx.push_clip_layer(&rect_to_cpu(rect).to_path(0.1));
        self.current.pushed_layers += 1;
    }

    fn draw_display_list(&mut self, list: &DisplayList, opacity: f32) {
        if opacity <= 0.0 {
            return;
        }
        for op in list.ops() {
            self.fill_op(op, opacity);
        }
    }

    fn draw_image(&mut self, image: &PortableImage, at: Point, paint: LayerPaint) {
        if paint.opacity <= 0.0 {
            return;
        }
        let Some(raster) = image.make_raster_image() else {
            tracing::warn!(id = image.unique_id(), "skipping unreadable image");
            return;
        };
        let Some(pixmap) = raster.pixmap() else {
            return;
        };

        self.save();
        self.push_paint_layers(paint);
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(
            self.current.transform * Affine::translate(at.to_vec2()),
        ));
        self.ctx.set_paint(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(pixmap.clone()),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        });
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(raster.width()),
            f64::from(raster.height()),
        ));
        self.restore();
    }

    fn flush(&mut self) {
        self.ctx.flush();
    }
}

/// Software render target.
pub struct CpuRenderTarget {
    canvas: CpuCanvas,
}

impl CpuRenderTarget {
    /// Allocate a target; `None` for empty sizes or sizes beyond [`CPU_MAX_DIMENSION`].
    pub fn new(size: ISize) -> Option<Self> {
        if size.is_empty() {
            return None;
        }
        let w: u16 = size.width.try_into().ok()?;
        let h: u16 = size.height.try_into().ok()?;
        Some(Self {
            canvas: CpuCanvas::new(w, h),
        })
    }

    /// Render and return the pixmap.
    pub fn into_pixmap(mut self) -> vello_cpu::Pixmap {
        self.canvas.restore_all();
        self.canvas.ctx.flush();
        let ISize { width, height } = self.canvas.size;
        let mut pixmap = vello_cpu::Pixmap::new(width as u16, height as u16);
        self.canvas.ctx.render_to_pixmap(&mut pixmap);
        pixmap
    }
}

impl RenderTarget for CpuRenderTarget {
    fn size(&self) -> ISize {
        self.canvas.size
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn snapshot(self: Box<Self>) -> Option<PortableImage> {
        Some(PortableImage::from_pixmap(self.into_pixmap()))
    }
}

/// Creates [`CpuRenderTarget`]s, optionally with a reduced size limit.
#[derive(Clone, Copy, Debug)]
pub struct CpuRasterFactory {
    max_dimension: u32,
}

impl CpuRasterFactory {
    /// Factory limited only by `vello_cpu`.
    pub fn new() -> Self {
        Self {
            max_dimension: CPU_MAX_DIMENSION,
        }
    }

    /// Factory refusing targets larger than `max_dimension` on either axis.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.clamp(1, CPU_MAX_DIMENSION),
        }
    }
}

impl Default for CpuRasterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTargetFactory for CpuRasterFactory {
    fn max_render_target_size(&self) -> u32 {
        self.max_dimension
    }

    fn make_render_target(&self, size: ISize) -> Option<Box<dyn RenderTarget>> {
        if size.max_dimension() > self.max_dimension {
            tracing::warn!(?size, max = self.max_dimension, "render target too large");
            return None;
        }
        let target = CpuRenderTarget::new(size)?;
        Some(Box::new(target))
    }
}

/// Onscreen-style software surface keeping the last submitted frame.
#[derive(Debug)]
pub struct CpuSurface {
    size: ISize,
    contents: Option<PortableImage>,
}

impl CpuSurface {
    /// Create a surface of `size` pixels.
    pub fn new(size: ISize) -> Self {
        Self {
            size,
            contents: None,
        }
    }

    /// Change the surface size; previous contents are discarded.
    pub fn resize(&mut self, size: ISize) {
        if size != self.size {
            self.size = size;
            self.contents = None;
        }
    }
}

impl Surface for CpuSurface {
    fn is_valid(&self) -> bool {
        !self.size.is_empty() && self.size.max_dimension() <= CPU_MAX_DIMENSION
    }

    fn size(&self) -> ISize {
        self.size
    }

    fn acquire_frame(&mut self, repaint: Option<Rect>) -> Option<SurfaceFrame<'_>> {
        let mut target = CpuRenderTarget::new(self.size)?;
        let background = match (repaint, &self.contents) {
            (Some(hole), Some(prev)) => retained_background(prev, hole),
            _ => None,
        };
        if let Some(bg) = background {
            target.canvas.draw_image(&bg, Point::ORIGIN, LayerPaint::OPAQUE);
        }
        let contents = &mut self.contents;
        Some(SurfaceFrame::new(Box::new(target), true, move |image| {
            *contents = Some(image);
            true
        }))
    }

    fn context(&self) -> Option<std::sync::Arc<dyn GpuContext>> {
        None
    }

    fn snapshot(&self) -> Option<PortableImage> {
        self.contents.clone()
    }
}

fn blend_to_cpu(mode: BlendMode) -> vello_cpu::peniko::BlendMode {
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
    vello_cpu::peniko::BlendMode::new(mix, compose)
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
