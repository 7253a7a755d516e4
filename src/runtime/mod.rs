//! Cross-thread plumbing: serial task runners, weak origin handles, and external-texture
//! render surfaces.
//!
//! Work that touches the backend context runs on the raster runner. Completions travel back
//! to the ui runner holding only an [`OriginHandle`], so a torn-down origin drops them.

mod origin;
mod render_surface;
mod task_runner;

pub use origin::{OriginContext, OriginHandle};
pub use render_surface::RenderSurface;
pub use task_runner::{Task, TaskRunner, TaskRunners, run_now_or_post_task};
