use crate::{
    foundation::core::{Affine, ISize, LayerPaint, Point, Rect, Vec2},
    image::PortableImage,
    paint::DisplayList,
};

/// Drawing surface the paint pass issues calls against.
///
/// Implementations keep a stack of states (transform, clip, open compositing scopes).
/// `save` and `save_layer` push a state; `restore` pops one and, for a scope opened by
/// `save_layer`, composites the scope into its parent with the scope's paint.
pub trait Canvas {
    /// Pixel size of the underlying target.
    fn size(&self) -> ISize;

    /// Push a state without opening a compositing scope.
    fn save(&mut self);

    /// Push a state and open an isolated compositing scope.
    ///
    /// `bounds` is a hint in current local coordinates; content outside may be dropped.
    fn save_layer(&mut self, bounds: Option<Rect>, paint: LayerPaint);

    /// Pop the most recent state. Unbalanced calls are ignored.
    fn restore(&mut self);

    /// Number of states currently pushed.
    fn save_count(&self) -> usize;

    /// Current local-to-device transform.
    fn transform(&self) -> Affine;

    /// Replace the current transform.
    fn set_transform(&mut self, transform: Affine);

    /// Pre-multiply the current transform by `transform`.
    fn concat(&mut self, transform: Affine) {
        let current = self.transform();
        self.set_transform(current * transform);
    }

    /// Translate local coordinates by `offset`.
    fn translate(&mut self, offset: Vec2) {
        self.concat(Affine::translate(offset));
    }

    /// Intersect the clip with `rect` in local coordinates.
    fn clip_rect(&mut self, rect: Rect);

    /// Replay a display list with an extra opacity multiplier.
    fn draw_display_list(&mut self, list: &DisplayList, opacity: f32);

    /// Draw an image with its top-left corner at `at`.
    fn draw_image(&mut self, image: &PortableImage, at: Point, paint: LayerPaint);

    /// Make all issued drawing visible to readers of the target.
    fn flush(&mut self);
}
