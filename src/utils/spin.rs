use std::hint;

/// Busy-waits for roughly `iterations` spin-loop hints.
///
/// Each iteration issues [`std::hint::spin_loop`], which lowers to the
/// platform's pause/yield instruction where one exists and to a no-op
/// otherwise. Callers scale `iterations` to build a linear backoff.
#[inline]
pub(crate) fn spin_wait(iterations: u32) {
    for _ in 0..iterations {
        hint::spin_loop();
    }
}
