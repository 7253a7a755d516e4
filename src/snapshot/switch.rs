use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Runtime toggle forcing snapshots onto the software path. Clones share one flag.
#[derive(Clone, Debug, Default)]
pub struct GpuDisabledSwitch {
    disabled: Arc<AtomicBool>,
}

impl GpuDisabledSwitch {
    pub fn new(disabled: bool) -> Self {
        Self {
            disabled: Arc::new(AtomicBool::new(disabled)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        let was = self.disabled.swap(disabled, Ordering::AcqRel);
        if was != disabled {
            tracing::debug!(disabled, "gpu snapshot switch flipped");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/snapshot/switch.rs"]
mod tests;
