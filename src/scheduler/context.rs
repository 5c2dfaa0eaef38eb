use crate::scheduler::executor::core::Shared;
use crate::scheduler::task::{Completable, PinnedTask, TaskSet};

use std::marker::PhantomData;
use std::sync::Arc;

/// The execution context of one worker.
///
/// A `TaskContext` carries the identity of the worker it was created
/// for and is handed to every task callback. Scheduler operations issued
/// through it act on behalf of that worker: submitted chunks land in its
/// own pipe and waits let it execute other work.
///
/// Contexts are bound to their worker's thread and cannot be sent to or
/// shared with other threads.
pub struct TaskContext<'a> {
    worker: usize,
    shared: &'a Shared,
    _not_send: PhantomData<*const ()>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(worker: usize, shared: &'a Shared) -> Self {
        Self {
            worker,
            shared,
            _not_send: PhantomData,
        }
    }

    /// Identifier of the worker running in this context.
    ///
    /// Worker 0 is the thread owning the scheduler; dedicated threads are
    /// numbered `1..num_workers()`.
    pub fn worker_id(&self) -> usize {
        self.worker
    }

    /// Total number of workers in the pool.
    pub fn num_workers(&self) -> usize {
        self.shared.num_workers()
    }

    /// Splits `task` into chunks and queues them on this worker.
    ///
    /// Returns once every chunk has been queued or, where the pipe was
    /// full, executed inline.
    pub fn add_task_set(&self, task: &Arc<TaskSet>) {
        self.shared.add_task_set(self.worker, task);
    }

    /// Queues `task` on the pinned list of its target worker.
    ///
    /// # Panics
    ///
    /// Panics if the target worker does not exist.
    pub fn add_pinned_task(&self, task: Arc<PinnedTask>) {
        self.shared.add_pinned_task(task);
    }

    /// Runs every task currently pinned to this worker.
    pub fn run_pinned_tasks(&self) {
        self.shared.run_pinned_tasks(self.worker);
    }

    /// Executes work until `task` completes.
    ///
    /// With `None`, makes a single attempt to run one piece of work and
    /// returns; this is a cooperative yield point.
    pub fn wait_for_task(&self, task: Option<&dyn Completable>) {
        self.shared.wait_for_task(self.worker, task);
    }
}
