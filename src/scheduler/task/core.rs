use crate::scheduler::context::TaskContext;

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Something that can be waited on with
/// [`wait_for_task`](crate::TaskScheduler::wait_for_task).
pub trait Completable {
    /// Returns `true` once every unit of work belonging to this task has
    /// finished executing.
    ///
    /// A task that has never been submitted reports itself complete.
    fn is_complete(&self) -> bool;
}

/// A half-open range `[start, end)` of a task set's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskSetPartition {
    /// First element of the range.
    pub start: u32,
    /// One past the last element of the range.
    pub end: u32,
}

impl TaskSetPartition {
    /// Creates the partition `[start, end)`.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of elements in the partition.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if the partition holds no elements.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Splits off at most `len` elements from the front of `self`.
    ///
    /// `self` keeps the remainder.
    pub(crate) fn split_front(&mut self, len: u32) -> TaskSetPartition {
        let len = len.min(self.len());
        let front = TaskSetPartition::new(self.start, self.start + len);

        self.start = front.end;
        front
    }
}

type TaskSetFn = dyn Fn(TaskSetPartition, &TaskContext<'_>) + Send + Sync;

/// A range-based unit of parallel work.
///
/// A `TaskSet` describes `set_size` elements processed by a callback that
/// receives a [`TaskSetPartition`] and the [`TaskContext`] of the worker
/// running it. On submission the scheduler carves the range into chunks
/// that are executed in parallel, in no particular order, each exactly
/// once. The callback must therefore be correct for any partitioning.
///
/// The caller keeps the task alive through an `Arc` for as long as it is
/// in flight; queued chunks hold additional references.
///
/// # Examples
///
/// ```rust,ignore
/// let task = Arc::new(TaskSet::new(1_000, |range, ctx| {
///     for i in range.start..range.end {
///         process(i, ctx.worker_id());
///     }
/// }).with_min_range(64));
///
/// scheduler.add_task_set(&task);
/// scheduler.wait_for_task(Some(task.as_ref()));
/// ```
pub struct TaskSet {
    /// Total number of elements.
    set_size: u32,

    /// Smallest chunk worth scheduling on its own.
    min_range: u32,

    /// Chunk size used when a queued chunk is split again.
    ///
    /// Recomputed on every submission.
    range_to_run: AtomicU32,

    /// Number of chunks produced but not yet completed.
    running: AtomicI32,

    /// User callback.
    func: Box<TaskSetFn>,
}

impl TaskSet {
    /// Creates a task set over `set_size` elements with a minimum chunk
    /// size of one element.
    pub fn new<F>(set_size: u32, func: F) -> Self
    where
        F: Fn(TaskSetPartition, &TaskContext<'_>) + Send + Sync + 'static,
    {
        Self {
            set_size,
            min_range: 1,
            range_to_run: AtomicU32::new(1),
            running: AtomicI32::new(0),
            func: Box::new(func),
        }
    }

    /// Sets the smallest chunk size the scheduler may produce.
    ///
    /// A value of zero is treated as one.
    pub fn with_min_range(mut self, min_range: u32) -> Self {
        self.min_range = min_range.max(1);
        self
    }

    /// Total number of elements.
    pub fn set_size(&self) -> u32 {
        self.set_size
    }

    /// Smallest chunk size the scheduler may produce.
    pub fn min_range(&self) -> u32 {
        self.min_range
    }

    /// Chunk size computed at the last submission.
    pub fn range_to_run(&self) -> u32 {
        self.range_to_run.load(Ordering::Relaxed)
    }

    /// Number of chunks produced but not yet completed.
    pub fn running_count(&self) -> i32 {
        self.running.load(Ordering::Acquire)
    }

    /// Resets the counter for a new submission, holding one guard count.
    pub(crate) fn begin_submission(&self, range_to_run: u32) {
        debug_assert!(
            self.is_complete(),
            "a task set must not be resubmitted while in flight"
        );

        self.range_to_run.store(range_to_run, Ordering::Relaxed);
        self.running.store(1, Ordering::Relaxed);
    }

    /// Releases the guard count taken by [`begin_submission`](Self::begin_submission).
    pub(crate) fn end_submission(&self) {
        self.chunk_done();
    }

    /// Accounts for one more chunk in flight.
    pub(crate) fn chunk_added(&self) {
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    /// Accounts for one completed chunk.
    pub(crate) fn chunk_done(&self) {
        let previous = self.running.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "task set running count went negative");
    }

    /// Invokes the callback on `partition`.
    pub(crate) fn execute_range(&self, partition: TaskSetPartition, ctx: &TaskContext<'_>) {
        (self.func)(partition, ctx);
    }
}

impl Completable for TaskSet {
    fn is_complete(&self) -> bool {
        self.running.load(Ordering::Acquire) == 0
    }
}

impl fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSet")
            .field("set_size", &self.set_size)
            .field("min_range", &self.min_range)
            .field("range_to_run", &self.range_to_run())
            .field("running", &self.running_count())
            .finish_non_exhaustive()
    }
}
