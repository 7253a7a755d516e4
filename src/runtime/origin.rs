use std::sync::{Arc, Weak};

#[derive(Debug)]
struct OriginState {
    label: String,
}

/// Execution context that issues cross-thread requests and receives their completions.
///
/// Completions hold an [`OriginHandle`], never the context itself. Dropping the context
/// cancels every completion that has not started running yet.
#[derive(Debug)]
pub struct OriginContext {
    state: Arc<OriginState>,
}

impl OriginContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Arc::new(OriginState {
                label: label.into(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.state.label
    }

    /// Weak handle for completions.
    pub fn handle(&self) -> OriginHandle {
        OriginHandle {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Tear the context down. Same as dropping it.
    pub fn dispose(self) {}
}

/// Liveness-checked reference to an [`OriginContext`].
#[derive(Clone, Debug)]
pub struct OriginHandle {
    state: Weak<OriginState>,
}

impl OriginHandle {
    /// Handle whose origin is already gone.
    pub fn detached() -> Self {
        Self { state: Weak::new() }
    }

    pub fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }

    /// Run `completion` if the origin is still alive; drop it silently otherwise.
    ///
    /// The origin is kept alive for the duration of the call. Returns whether it ran.
    pub fn run_if_alive(&self, completion: impl FnOnce()) -> bool {
        let Some(state) = self.state.upgrade() else {
            tracing::debug!("origin disposed; completion dropped");
            return false;
        };
        tracing::trace!(origin = %state.label, "delivering completion");
        completion();
        drop(state);
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/origin.rs"]
mod tests;
