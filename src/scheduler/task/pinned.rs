use super::Completable;
use crate::scheduler::context::TaskContext;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

type PinnedFn = dyn Fn(&TaskContext<'_>) + Send + Sync;

/// A task that must execute on one specific worker.
///
/// Pinned tasks bypass work stealing entirely: they are queued on their
/// target worker's pinned list and run by that worker, ahead of any
/// range work, the next time it looks for something to do. Use them for
/// work tied to per-thread state such as thread-affine API contexts.
///
/// A pinned task targeting worker 0 runs when the thread owning the
/// scheduler waits or calls
/// [`run_pinned_tasks`](crate::TaskScheduler::run_pinned_tasks).
pub struct PinnedTask {
    /// Worker this task is pinned to.
    worker: usize,

    /// 1 while queued or running, 0 once executed.
    running: AtomicU32,

    /// User callback.
    func: Box<PinnedFn>,
}

impl PinnedTask {
    /// Creates a task pinned to `worker`.
    pub fn new<F>(worker: usize, func: F) -> Self
    where
        F: Fn(&TaskContext<'_>) + Send + Sync + 'static,
    {
        Self {
            worker,
            running: AtomicU32::new(0),
            func: Box::new(func),
        }
    }

    /// Worker this task is pinned to.
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub(crate) fn mark_queued(&self) {
        self.running.store(1, Ordering::Relaxed);
    }

    /// Runs the callback and marks the task complete.
    pub(crate) fn execute(&self, ctx: &TaskContext<'_>) {
        debug_assert_eq!(ctx.worker_id(), self.worker);

        (self.func)(ctx);
        self.running.store(0, Ordering::Release);
    }
}

impl Completable for PinnedTask {
    fn is_complete(&self) -> bool {
        self.running.load(Ordering::Acquire) == 0
    }
}

impl fmt::Debug for PinnedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedTask")
            .field("worker", &self.worker)
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}
