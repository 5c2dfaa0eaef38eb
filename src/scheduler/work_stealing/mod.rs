//! Work-stealing queue primitives.
//!
//! This module implements the per-worker data structures used by the
//! scheduler to distribute work across worker threads.
//!
//! It consists of:
//! - [`pipe`]: a bounded lock-free queue of range chunks; the owner
//!   pushes and pops at the front, other workers steal from the back,
//! - [`pinned`]: a multi-producer, single-consumer list of tasks that
//!   must run on one specific worker.
//!
//! Both are lock-free on their hot paths.

pub(crate) mod pinned;
pub(crate) mod pipe;
