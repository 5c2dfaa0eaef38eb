//! Task primitives.
//!
//! This module defines the units of work the scheduler executes:
//!
//! - [`TaskSet`]: a range of elements processed in parallel chunks,
//! - [`PinnedTask`]: a callback bound to one worker,
//! - [`Completable`]: the completion query used by waits.
//!
//! Chunks of a task set travel through the work-stealing pipes as
//! crate-private sub-tasks.

mod core;
mod pinned;
mod sub_task;

pub use self::core::{Completable, TaskSet, TaskSetPartition};
pub use pinned::PinnedTask;

pub(crate) use sub_task::SubTask;
