use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::image::PortableImage;

/// Latest frame of every registered external texture, shared between the thread that
/// produces frames and the paint pass.
#[derive(Clone, Debug, Default)]
pub struct TextureRegistry {
    frames: Arc<Mutex<HashMap<u64, PortableImage>>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new frame for `texture_id`, replacing the previous one.
    pub fn publish(&self, texture_id: u64, frame: PortableImage) {
        match self.frames.lock() {
            Ok(mut frames) => {
                frames.insert(texture_id, frame);
            }
            Err(_) => tracing::error!(texture_id, "texture registry lock poisoned"),
        }
    }

    /// Forget `texture_id`. Texture layers referring to it paint nothing afterwards.
    pub fn unregister(&self, texture_id: u64) -> Option<PortableImage> {
        self.frames.lock().ok()?.remove(&texture_id)
    }

    /// Latest frame for `texture_id`.
    pub fn get(&self, texture_id: u64) -> Option<PortableImage> {
        self.frames.lock().ok()?.get(&texture_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
