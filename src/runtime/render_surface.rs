use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    compositor::{Compositor, FrameReport},
    config::EngineConfig,
    foundation::{
        core::ISize,
        error::{LaminateError, LaminateResult},
    },
    layer::LayerTree,
    paint::Canvas,
    render::Surface,
    snapshot::SnapshotController,
};

use super::{OriginHandle, TaskRunners, run_now_or_post_task};

struct SurfaceState {
    surface: Option<Box<dyn Surface>>,
    compositor: Compositor,
}

/// Drawing target bound to a caller-owned external texture.
///
/// [`setup`] allocates the backend surface on the raster runner, publishes the backend's
/// canonical handle (which may differ from the texture id passed to [`new`]), and then
/// notifies the ui runner. Frames posted with [`paint`] or [`draw_tree`] after `setup` run
/// after the allocation because the raster runner is serial.
///
/// [`setup`]: RenderSurface::setup
/// [`new`]: RenderSurface::new
/// [`paint`]: RenderSurface::paint
/// [`draw_tree`]: RenderSurface::draw_tree
pub struct RenderSurface {
    requested: u64,
    raw_texture: Arc<AtomicU64>,
    runners: TaskRunners,
    controller: Arc<SnapshotController>,
    state: Arc<Mutex<SurfaceState>>,
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("requested", &self.requested)
            .field("raw_texture", &self.raw_texture())
            .finish()
    }
}

impl RenderSurface {
    pub fn new(
        raw_texture: u64,
        runners: TaskRunners,
        controller: Arc<SnapshotController>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            requested: raw_texture,
            raw_texture: Arc::new(AtomicU64::new(raw_texture)),
            runners,
            controller,
            state: Arc::new(Mutex::new(SurfaceState {
                surface: None,
                compositor: Compositor::new(config),
            })),
        }
    }

    /// Canonical texture handle: the id passed to [`new`] until `setup` publishes the
    /// backend's own handle.
    ///
    /// [`new`]: RenderSurface::new
    pub fn raw_texture(&self) -> u64 {
        self.raw_texture.load(Ordering::Acquire)
    }

    /// Return `true` once a backend surface is bound.
    pub fn is_ready(&self) -> bool {
        lock(&self.state).surface.is_some()
    }

    /// Bind the external texture as a `width` x `height` render target.
    ///
    /// `callback` runs on the ui runner with the canonical handle, or `None` when the surface
    /// could not be created. It is dropped without running when `origin` is gone.
    #[tracing::instrument(
        skip_all,
        fields(texture = self.requested, width = width, height = height)
    )]
    pub fn setup(
        &self,
        width: u32,
        height: u32,
        origin: OriginHandle,
        callback: impl FnOnce(Option<u64>) + Send + 'static,
    ) -> bool {
        let descriptor = self
            .controller
            .platform_descriptor(self.requested, ISize::new(width, height));
        let controller = Arc::clone(&self.controller);
        let state = Arc::clone(&self.state);
        let raw_texture = Arc::clone(&self.raw_texture);
        let ui = Arc::clone(&self.runners.ui);

        run_now_or_post_task(&self.runners.raster, move || {
            let surface = controller.make_offscreen_surface(&descriptor);
            let handle = surface
                .as_ref()
                .map(|s| s.backend_handle().unwrap_or(descriptor.handle().raw()));
            {
                let mut state = lock(&state);
                state.surface = surface;
                state.compositor.reset();
            }
            match handle {
                Some(h) => {
                    raw_texture.store(h, Ordering::Release);
                    tracing::debug!(handle = h, "external texture bound");
                }
                None => tracing::warn!("external texture could not be bound"),
            }
            run_now_or_post_task(&ui, move || {
                origin.run_if_alive(move || callback(handle));
            });
        })
    }

    /// Draw one full frame into the texture on the raster runner.
    pub fn paint(&self, draw: impl FnOnce(&mut dyn Canvas) + Send + 'static) -> bool {
        let state = Arc::clone(&self.state);
        run_now_or_post_task(&self.runners.raster, move || {
            let mut state = lock(&state);
            let Some(surface) = state.surface.as_mut() else {
                tracing::warn!("paint before the render surface was set up");
                return;
            };
            let Some(mut frame) = surface.acquire_frame(None) else {
                tracing::warn!("render surface gave no frame");
                return;
            };
            let canvas = frame.canvas();
            draw(canvas);
            canvas.flush();
            if !frame.submit() {
                tracing::warn!("render surface frame was not presented");
            }
        })
    }

    /// Composite `tree` into the texture on the raster runner and report to `callback` on
    /// the ui runner.
    pub fn draw_tree(
        &self,
        tree: LayerTree,
        origin: OriginHandle,
        callback: impl FnOnce(LaminateResult<FrameReport>) + Send + 'static,
    ) -> bool {
        let state = Arc::clone(&self.state);
        let ui = Arc::clone(&self.runners.ui);
        run_now_or_post_task(&self.runners.raster, move || {
            let result = {
                let mut guard = lock(&state);
                let SurfaceState {
                    surface,
                    compositor,
                } = &mut *guard;
                match surface.as_mut() {
                    Some(surface) => compositor.draw_frame(tree, surface.as_mut()),
                    None => Err(LaminateError::validation("render surface is not set up")),
                }
            };
            run_now_or_post_task(&ui, move || {
                origin.run_if_alive(move || callback(result));
            });
        })
    }
}

fn lock(state: &Mutex<SurfaceState>) -> MutexGuard<'_, SurfaceState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/render_surface.rs"]
mod tests;
