//! Task executor implementation.
//!
//! This module contains the components that execute work within the
//! scheduler.
//!
//! It is composed of:
//! - [`core`]: the shared scheduling state and algorithm (splitting,
//!   stealing, waiting, parking and waking),
//! - [`worker`]: the loop run by each dedicated worker thread.

pub(crate) mod core;
pub(crate) mod worker;
