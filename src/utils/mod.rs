//! Low-level helpers used internally by the scheduler.
//!
//! This module currently exposes a portable spin-wait primitive used by
//! idle workers before they park.

mod spin;

pub(crate) use spin::spin_wait;
