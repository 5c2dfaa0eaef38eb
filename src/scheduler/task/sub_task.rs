use super::{TaskSet, TaskSetPartition};
use crate::scheduler::context::TaskContext;

use std::sync::Arc;

/// A chunk of a task set: the unit stored in pipes and stolen between
/// workers.
///
/// A queued or executing chunk holds one unit of its task's running
/// count; [`execute`](Self::execute) consumes the chunk and releases it.
/// Remainders being carved up by the producer are not counted.
pub(crate) struct SubTask {
    pub(crate) task: Arc<TaskSet>,
    pub(crate) partition: TaskSetPartition,
}

impl SubTask {
    pub(crate) fn new(task: Arc<TaskSet>, partition: TaskSetPartition) -> Self {
        Self { task, partition }
    }

    /// Splits off a chunk of at most `len` elements from the front.
    ///
    /// The returned chunk is not yet counted; the caller accounts for it.
    pub(crate) fn split_front(&mut self, len: u32) -> SubTask {
        SubTask {
            task: self.task.clone(),
            partition: self.partition.split_front(len),
        }
    }

    /// Runs the chunk and marks it done.
    pub(crate) fn execute(self, ctx: &TaskContext<'_>) {
        self.task.execute_range(self.partition, ctx);
        self.task.chunk_done();
    }
}
