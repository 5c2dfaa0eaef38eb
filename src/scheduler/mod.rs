//! Core scheduler components.
//!
//! This module contains the building blocks of the scheduler, including
//! task descriptions, work-stealing queues, worker threads and the
//! public handle tying them together.
//!
//! It is responsible for:
//! - splitting task sets into chunks and distributing them,
//! - stealing chunks between workers and re-splitting them,
//! - running worker-pinned tasks,
//! - parking idle workers and waking them when work arrives.

mod core;
mod executor;
mod work_stealing;

pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod profiler;

pub mod task;

pub use self::core::TaskScheduler;
