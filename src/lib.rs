//! # taskpipe
//!
//! **taskpipe** is a lock-free, work-stealing scheduler for data-parallel
//! work on a fixed pool of threads.
//!
//! Work is described as a [`TaskSet`]: a range of elements and a callback
//! over sub-ranges of it. On submission the range is split into chunks
//! that are pushed onto the submitting worker's queue; idle workers steal
//! chunks from each other and split them further as they go. Tasks that
//! must run on one particular thread are submitted as [`PinnedTask`]s.
//!
//! The thread that builds the scheduler is worker 0 and takes part in
//! execution whenever it waits.
//!
//! It offers:
//!
//! - **Bounded lock-free queues** per worker; a full queue makes the
//!   producer run work inline instead of blocking or allocating
//! - **Adaptive chunking**: stolen chunks are re-split down to a size
//!   derived from the worker count and the task's minimum range
//! - **Worker-pinned tasks** that bypass stealing
//! - **Spin-then-park idling** with a condition variable on the cold path
//! - **Instrumentation hooks** for thread start/stop and wait start/stop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use taskpipe::{SchedulerBuilder, TaskSet};
//!
//! let scheduler = SchedulerBuilder::new().worker_threads(4).build()?;
//!
//! let sum = Arc::new(AtomicU64::new(0));
//! let total = sum.clone();
//! let task = Arc::new(TaskSet::new(1_000_000, move |range, _ctx| {
//!     let partial: u64 = (range.start..range.end).map(u64::from).sum();
//!     total.fetch_add(partial, Ordering::Relaxed);
//! }).with_min_range(1_024));
//!
//! scheduler.add_task_set(&task);
//! scheduler.wait_for_task(Some(task.as_ref()));
//! ```
//!
//! ## Modules
//!
//! - [`task`]: task sets, pinned tasks and completion

mod error;
mod scheduler;
mod utils;

pub use error::{ConfigError, SchedulerError};
pub use scheduler::TaskScheduler;
pub use scheduler::builder::SchedulerBuilder;
pub use scheduler::config::{
    DEFAULT_MAX_INITIAL_PARTITIONS, DEFAULT_PIPE_SIZE_LOG2, DEFAULT_SPIN_BACKOFF_MULTIPLIER,
    DEFAULT_SPIN_COUNT, MAX_PIPE_SIZE_LOG2, MIN_PIPE_SIZE_LOG2, SchedulerConfig,
};
pub use scheduler::context::TaskContext;
pub use scheduler::profiler::{ProfilerCallback, ProfilerCallbacks};
pub use scheduler::task;
pub use scheduler::task::{Completable, PinnedTask, TaskSet, TaskSetPartition};
