//! Recorded drawing content and the abstract canvas the paint pass draws into.

mod canvas;
mod display_list;
mod recording;

pub use canvas::Canvas;
pub use display_list::{DisplayList, DisplayListBuilder, DrawOp};
pub use recording::{CanvasOp, RecordingCanvas};
