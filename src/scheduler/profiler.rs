use std::fmt;
use std::sync::Arc;

/// Instrumentation hook receiving the id of the worker that fires it.
pub type ProfilerCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Optional instrumentation hooks.
///
/// Hooks run synchronously on the worker thread they describe, so they
/// should be cheap. They must not submit work or wait on the scheduler.
#[derive(Clone, Default)]
pub struct ProfilerCallbacks {
    /// A dedicated worker thread started.
    pub thread_start: Option<ProfilerCallback>,
    /// A dedicated worker thread is about to exit.
    pub thread_stop: Option<ProfilerCallback>,
    /// A worker is about to park waiting for work.
    pub wait_start: Option<ProfilerCallback>,
    /// A parked worker woke up.
    pub wait_stop: Option<ProfilerCallback>,
}

impl ProfilerCallbacks {
    pub(crate) fn thread_start(&self, worker: usize) {
        fire(&self.thread_start, worker);
    }

    pub(crate) fn thread_stop(&self, worker: usize) {
        fire(&self.thread_stop, worker);
    }

    pub(crate) fn wait_start(&self, worker: usize) {
        fire(&self.wait_start, worker);
    }

    pub(crate) fn wait_stop(&self, worker: usize) {
        fire(&self.wait_stop, worker);
    }
}

fn fire(callback: &Option<ProfilerCallback>, worker: usize) {
    if let Some(callback) = callback {
        callback(worker);
    }
}

impl fmt::Debug for ProfilerCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilerCallbacks")
            .field("thread_start", &self.thread_start.is_some())
            .field("thread_stop", &self.thread_stop.is_some())
            .field("wait_start", &self.wait_start.is_some())
            .field("wait_stop", &self.wait_stop.is_some())
            .finish()
    }
}
