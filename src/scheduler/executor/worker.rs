use crate::scheduler::executor::core::Shared;
use crate::utils::spin_wait;

use std::sync::Arc;

use tracing::debug;

/// A dedicated worker thread of the pool.
///
/// The execution order of each iteration is:
/// 1. Run tasks pinned to this worker
/// 2. Pop a chunk from the local pipe
/// 3. Steal a chunk from another worker's pipe
/// 4. Spin with linear backoff, then park until work is signalled
pub(crate) struct Worker {
    /// Unique identifier of the worker, `1..num_workers`.
    id: usize,

    /// State shared with the rest of the pool.
    shared: Arc<Shared>,
}

impl Worker {
    /// Creates a new worker.
    ///
    /// The caller must already have accounted for the worker in the
    /// pool's live-thread count.
    pub(crate) fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    /// Runs the worker loop until the pool stops.
    ///
    /// Consecutive failed searches raise an idle counter. Below the spin
    /// threshold the worker busy-waits for `idle * multiplier` spin hints;
    /// past it the worker parks. Any executed chunk resets the counter.
    pub(crate) fn run(self) {
        let shared = &*self.shared;
        let _running = RunningGuard(shared);

        debug!(worker = self.id, "worker started");
        shared.profiler().thread_start(self.id);

        let mut victim_hint = self.id + 1;
        let mut idle: u32 = 0;

        while shared.is_running() {
            if shared.try_run_task(self.id, &mut victim_hint) {
                idle = 0;
                continue;
            }

            idle += 1;
            if idle > shared.spin_count() {
                shared.wait_for_new_tasks(self.id);
                idle = 0;
            } else {
                spin_wait(idle.saturating_mul(shared.spin_backoff_multiplier()));
            }
        }

        shared.profiler().thread_stop(self.id);
        debug!(worker = self.id, "worker stopped");
    }
}

/// Removes the worker from the live count when its loop exits, including
/// by unwinding out of a task callback.
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.thread_stopped();
    }
}
