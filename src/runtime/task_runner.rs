use std::{
    cell::Cell,
    sync::{Arc, Mutex, mpsc},
    thread::{self, JoinHandle, ThreadId},
};

use anyhow::Context;

use crate::foundation::error::{LaminateError, LaminateResult};

/// Unit of work posted to a [`TaskRunner`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static ON_RUNNER: Cell<bool> = const { Cell::new(false) };
}

/// Serial task queue backed by a dedicated thread.
///
/// Tasks run one at a time in the order they were posted. Dropping the runner stops
/// accepting tasks, drains the queue, and joins the thread. When the last reference is
/// dropped from any runner thread the thread is detached instead; two runners joining
/// each other would never finish.
pub struct TaskRunner {
    label: String,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("label", &self.label)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl TaskRunner {
    /// Spawn a runner thread named `label`.
    pub fn new(label: impl Into<String>) -> LaminateResult<Arc<Self>> {
        let label = label.into();
        let (tx, rx) = mpsc::channel::<Task>();
        let handle = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                ON_RUNNER.with(|on| on.set(true));
                while let Ok(task) = rx.recv() {
                    task();
                }
            })
            .with_context(|| format!("spawn task runner '{label}'"))?;
        Ok(Arc::new(Self {
            thread_id: handle.thread().id(),
            label,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue `task`. Returns `false` when the runner has shut down.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let Ok(sender) = self.sender.lock() else {
            return false;
        };
        match sender.as_ref() {
            Some(tx) => tx.send(Box::new(task)).is_ok(),
            None => {
                tracing::debug!(runner = %self.label, "task posted after shutdown; dropped");
                false
            }
        }
    }

    /// Return `true` when called from the runner's thread.
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stop accepting tasks and wait for the queued ones to finish.
    ///
    /// Called from any runner thread it only stops accepting tasks; the queue still drains
    /// and the thread exits on its own.
    pub fn shutdown(&self) -> LaminateResult<()> {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if self.runs_tasks_on_current_thread() || ON_RUNNER.with(Cell::get) {
            tracing::trace!(runner = %self.label, "shutdown from a runner thread; detaching");
            return Ok(());
        }
        let handle = match self.handle.lock() {
            Ok(mut h) => h.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(h) => h.join().map_err(|_| {
                LaminateError::backend(format!("task runner '{}' panicked", self.label))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(%err, "task runner shutdown failed");
        }
    }
}

/// Run `task` immediately when already on `runner`'s thread, otherwise post it.
pub fn run_now_or_post_task(runner: &TaskRunner, task: impl FnOnce() + Send + 'static) -> bool {
    if runner.runs_tasks_on_current_thread() {
        task();
        true
    } else {
        runner.post_task(task)
    }
}

/// The runners the engine schedules work on.
///
/// `ui` builds layer trees and receives completions; `raster` owns the backend context and
/// executes every GPU operation. Both may be the same runner.
#[derive(Clone, Debug)]
pub struct TaskRunners {
    pub ui: Arc<TaskRunner>,
    pub raster: Arc<TaskRunner>,
}

impl TaskRunners {
    pub fn new(ui: Arc<TaskRunner>, raster: Arc<TaskRunner>) -> Self {
        Self { ui, raster }
    }

    /// Spawn a `ui` and a `raster` thread, labels prefixed with `prefix`.
    pub fn spawn(prefix: &str) -> LaminateResult<Self> {
        Ok(Self {
            ui: TaskRunner::new(format!("{prefix}.ui"))?,
            raster: TaskRunner::new(format!("{prefix}.raster"))?,
        })
    }

    /// One thread serving as both `ui` and `raster`.
    pub fn single_threaded(label: &str) -> LaminateResult<Self> {
        let runner = TaskRunner::new(label)?;
        Ok(Self {
            ui: Arc::clone(&runner),
            raster: runner,
        })
    }

    /// Return `true` when `ui` and `raster` share a thread.
    pub fn is_single_threaded(&self) -> bool {
        Arc::ptr_eq(&self.ui, &self.raster)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/task_runner.rs"]
mod tests;
