#![forbid(unsafe_code)]

//! Retained layer-tree compositing.
//!
//! A frame is a [`LayerTree`] built with [`LayerTreeBuilder`]. The [`Compositor`] diffs it
//! against the previous frame, prerolls bounds and opacity capabilities, paints only the
//! damaged region, and keeps expensive subtrees in a [`RasterCache`]. The
//! [`SnapshotController`] turns display lists and external textures into
//! [`PortableImage`]s, and [`RenderSurface`] binds an external texture as a render target
//! through the raster/ui task runners.

mod foundation;

pub mod compositor;
pub mod config;
pub mod flow;
pub mod geometry;
pub mod image;
pub mod layer;
pub mod paint;
pub mod render;
pub mod runtime;
pub mod snapshot;

pub use compositor::{Compositor, FrameReport, LayerTreeHolder};
pub use config::{
    CompositorConfig, EngineConfig, RasterCacheConfig, SnapshotConfig, ValidationPolicy,
};
pub use flow::{RasterCache, RasterCacheKey, RasterCacheKeyKind, TextureRegistry};
pub use foundation::core::{
    Affine, BezPath, BlendMode, ISize, LayerPaint, Point, Rect, Rgba8, Size, Vec2,
};
pub use foundation::error::{LaminateError, LaminateResult};
pub use geometry::DamageRegion;
pub use crate::image::{PlatformTraits, PortableImage, TextureDescriptor};
pub use layer::{
    BlendLayer, LayerId, LayerKind, LayerTree, LayerTreeBuilder, PictureLayer, TextureLayer,
};
pub use paint::{Canvas, DisplayList, DisplayListBuilder};
pub use render::{GpuContext, RenderTarget, RenderTargetFactory, Surface, SurfaceFrame};
pub use runtime::{OriginContext, OriginHandle, RenderSurface, TaskRunner, TaskRunners};
pub use snapshot::{
    GpuDisabledSwitch, SnapshotController, SnapshotRequest, SnapshotSources, request_snapshot,
};
