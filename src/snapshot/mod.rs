//! On-demand conversion of display lists and external textures into portable images.
//!
//! [`SnapshotController`] picks a render target (the onscreen GPU context, a producer's
//! offscreen context, or software), draws, and reads the result back to host memory.
//! [`request_snapshot`] wraps that in the raster-to-ui round trip.

mod controller;
mod request;
mod switch;

pub use controller::{
    SnapshotController, SnapshotDelegate, SnapshotSources, SnapshotSurfaceProducer,
};
pub use request::{SnapshotRequest, request_snapshot};
pub use switch::GpuDisabledSwitch;
