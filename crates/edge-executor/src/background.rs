//! Work that must keep running after the response has been returned.

use std::future::Future;
use std::pin::Pin;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[cfg(not(target_arch = "wasm32"))]
use futures::FutureExt;

/// A unit of background work.
#[cfg(not(target_arch = "wasm32"))]
pub type BackgroundTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A unit of background work.
///
/// Spin runs components on a single thread, so tasks need not be `Send`.
#[cfg(target_arch = "wasm32")]
pub type BackgroundTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Host capability for registering background work.
///
/// Registered tasks are never awaited by the caller. The host keeps them
/// alive until they complete, even after the response has gone out.
pub trait BackgroundWork {
    /// Register a task. Must not block.
    fn register(&self, task: BackgroundTask);
}

/// Collects tasks and runs them once the host decides to.
///
/// The Spin workload hands the response to the host first and then drains
/// this queue before the handler returns.
#[derive(Default)]
pub struct DeferredWork {
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl DeferredWork {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued task to completion, including tasks registered while
    /// draining.
    pub async fn run_all(&self) -> usize {
        let mut completed = 0;
        loop {
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return completed;
            }
            completed += batch.len();
            futures::future::join_all(batch).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BackgroundTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BackgroundWork for DeferredWork {
    fn register(&self, task: BackgroundTask) {
        self.lock().push(task);
        tracing::debug!(pending = self.len(), "background task deferred");
    }
}

impl std::fmt::Debug for DeferredWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWork")
            .field("pending", &self.len())
            .finish()
    }
}

/// Spawns each task on the tokio runtime and keeps its handle until joined.
///
/// Finished handles are reaped whenever a task is registered, so a host that
/// never calls `join_all` holds only the tasks still running.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct TokioWork {
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    reaped: AtomicUsize,
}

#[cfg(not(target_arch = "wasm32"))]
impl TokioWork {
    /// Create a new spawner. Must be used from within a tokio runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spawned tasks still running.
    pub fn in_flight(&self) -> usize {
        let mut handles = self.lock();
        self.reap(&mut handles);
        handles.len()
    }

    /// Wait for every spawned task, including tasks spawned while waiting.
    ///
    /// Returns the number of tasks completed since the last call, counting
    /// those already reaped.
    pub async fn join_all(&self) -> usize {
        let mut joined = 0;
        loop {
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return joined + self.reaped.swap(0, Ordering::SeqCst);
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background task panicked");
                }
                joined += 1;
            }
        }
    }

    fn reap(&self, handles: &mut Vec<tokio::task::JoinHandle<()>>) {
        let (finished, running): (Vec<_>, Vec<_>) =
            std::mem::take(handles).into_iter().partition(|h| h.is_finished());
        *handles = running;

        for handle in finished {
            if let Some(Err(e)) = handle.now_or_never() {
                tracing::warn!(error = %e, "background task panicked");
            }
            self.reaped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<tokio::task::JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl BackgroundWork for TokioWork {
    fn register(&self, task: BackgroundTask) {
        let mut handles = self.lock();
        self.reap(&mut handles);
        handles.push(tokio::spawn(task));
    }
}

impl<W: BackgroundWork + ?Sized> BackgroundWork for std::sync::Arc<W> {
    fn register(&self, task: BackgroundTask) {
        (**self).register(task)
    }
}
