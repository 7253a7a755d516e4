use crate::{
    foundation::core::{Affine, ISize, LayerPaint, Point, Rect},
    geometry::{intersect_nonempty, map_rect},
    image::PortableImage,
    paint::{Canvas, DisplayList},
};

/// A canvas call captured by [`RecordingCanvas`].
///
/// Geometry is recorded together with the transform in effect, so tests can assert on
/// device-space placement without replaying the stream.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    /// `save()`.
    Save,
    /// `save_layer()`.
    SaveLayer {
        /// Bounds hint in local coordinates.
        bounds: Option<Rect>,
        /// Scope paint.
        paint: LayerPaint,
        /// Transform at the time of the call.
        transform: Affine,
    },
    /// `restore()` of a plain save.
    Restore,
    /// `restore()` closing a compositing scope.
    RestoreLayer,
    /// `clip_rect()`.
    ClipRect {
        /// Device-space clip after the call.
        device_clip: Rect,
    },
    /// `draw_display_list()`.
    DrawDisplayList {
        /// Fingerprint of the list.
        fingerprint: u64,
        /// Device-space bounds of the list.
        device_bounds: Rect,
        /// Opacity multiplier.
        opacity: f32,
        /// Transform at the time of the call.
        transform: Affine,
    },
    /// `draw_image()`.
    DrawImage {
        /// Unique id of the image.
        image_id: u64,
        /// Image pixel size.
        size: ISize,
        /// Top-left corner in local coordinates.
        at: Point,
        /// Image paint.
        paint: LayerPaint,
        /// Transform at the time of the call.
        transform: Affine,
    },
    /// `flush()`.
    Flush,
}

#[derive(Clone, Copy, Debug)]
struct State {
    transform: Affine,
    clip: Rect,
    is_layer: bool,
}

/// Canvas that records calls instead of drawing pixels.
#[derive(Debug)]
pub struct RecordingCanvas {
    size: ISize,
    current: State,
    stack: Vec<State>,
    ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    /// Create a recorder for a target of `size` pixels.
    pub fn new(size: ISize) -> Self {
        Self {
            size,
            current: State {
                transform: Affine::IDENTITY,
                clip: size.to_rect(),
                is_layer: false,
            },
            stack: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Recorded calls in order.
    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    /// Forget recorded calls. The state stack is kept.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of `save_layer` calls recorded.
    pub fn save_layer_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, CanvasOp::SaveLayer { .. }))
            .count()
    }

    /// Number of display-list and image draws recorded.
    pub fn draw_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    CanvasOp::DrawDisplayList { .. } | CanvasOp::DrawImage { .. }
                )
            })
            .count()
    }

    /// Device-space clip currently in effect.
    pub fn device_clip(&self) -> Rect {
        self.current.clip
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> ISize {
        self.size
    }

    fn save(&mut self) {
        self.stack.push(self.current);
        self.current.is_layer = false;
        self.ops.push(CanvasOp::Save);
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: LayerPaint) {
        self.stack.push(self.current);
        self.current.is_layer = true;
        self.ops.push(CanvasOp::SaveLayer {
            bounds,
            paint,
            transform: self.current.transform,
        });
    }

    fn restore(&mut self) {
        let Some(prev) = self.stack.pop() else {
            return;
        };
        let op = if self.current.is_layer {
            CanvasOp::RestoreLayer
        } else {
            CanvasOp::Restore
        };
        self.current = prev;
        self.ops.push(op);
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
        let device = map_rect(self.current.transform, rect);
        self.current.clip = intersect_nonempty(self.current.clip, device);
        self.ops.push(CanvasOp::ClipRect {
            device_clip: self.current.clip,
        });
    }

    fn draw_display_list(&mut self, list: &DisplayList, opacity: f32) {
        self.ops.push(CanvasOp::DrawDisplayList {
            fingerprint: list.fingerprint(),
            device_bounds: map_rect(self.current.transform, list.bounds()),
            opacity,
            transform: self.current.transform,
        });
    }

    fn draw_image(&mut self, image: &PortableImage, at: Point, paint: LayerPaint) {
        self.ops.push(CanvasOp::DrawImage {
            image_id: image.unique_id(),
            size: image.size(),
            at,
            paint,
            transform: self.current.transform,
        });
    }

    fn flush(&mut self) {
        self.ops.push(CanvasOp::Flush);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/paint/recording.rs"]
mod tests;
