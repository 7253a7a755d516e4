use std::sync::Arc;

use crate::{
    foundation::core::ISize,
    image::{PortableImage, TextureDescriptor},
    paint::DisplayList,
    runtime::{OriginHandle, TaskRunners, run_now_or_post_task},
};

use super::controller::SnapshotController;

/// What to turn into an image.
#[derive(Clone, Debug)]
pub enum SnapshotRequest {
    /// Render a display list at `size` pixels.
    Content { list: DisplayList, size: ISize },
    /// Wrap an external texture.
    Texture(TextureDescriptor),
}

impl SnapshotRequest {
    /// Requested image size.
    pub fn size(&self) -> ISize {
        match self {
            Self::Content { size, .. } => *size,
            Self::Texture(descriptor) => descriptor.size(),
        }
    }

    /// Produce the image. Must run on the thread owning the backend context.
    pub fn execute(&self, controller: &SnapshotController) -> Option<PortableImage> {
        match self {
            Self::Content { list, size } => controller.make_raster_snapshot(list, *size),
            Self::Texture(descriptor) => controller.make_from_texture(descriptor),
        }
    }
}

/// Produce a snapshot on the raster runner and deliver it to `callback` on the ui runner.
///
/// Delivery is always a posted task, never a direct call, even when both runners share a
/// thread. When `origin` is gone by then, the result is dropped without calling `callback`.
/// Returns `false` when the raster runner no longer accepts tasks.
#[tracing::instrument(
    skip_all,
    fields(width = request.size().width, height = request.size().height)
)]
pub fn request_snapshot(
    runners: &TaskRunners,
    controller: Arc<SnapshotController>,
    origin: OriginHandle,
    request: SnapshotRequest,
    callback: impl FnOnce(Option<PortableImage>) + Send + 'static,
) -> bool {
    let ui = Arc::clone(&runners.ui);
    run_now_or_post_task(&runners.raster, move || {
        let image = request.execute(&controller);
        let posted = ui.post_task(move || {
            origin.run_if_alive(move || callback(image));
        });
        if !posted {
            tracing::warn!("ui runner is gone; snapshot result dropped");
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/snapshot/request.rs"]
mod tests;
