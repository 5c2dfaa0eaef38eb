use super::TaskScheduler;
use super::config::SchedulerConfig;
use super::profiler::ProfilerCallbacks;
use crate::error::SchedulerError;

use std::sync::Arc;

/// Builder for configuring and creating a task scheduler.
///
/// `SchedulerBuilder` allows customizing scheduler parameters before
/// starting the worker pool: the number of workers, queue sizing, the
/// idle spin strategy and instrumentation hooks.
///
/// # Examples
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new()
///     .worker_threads(4)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct SchedulerBuilder {
    /// Tunable parameters.
    config: SchedulerConfig,

    /// Instrumentation hooks.
    profiler: ProfilerCallbacks,
}

impl SchedulerBuilder {
    /// Creates a new `SchedulerBuilder` with default configuration.
    ///
    /// By default, the number of workers is set to the number of
    /// available logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder starting from an existing configuration, for
    /// instance one loaded with [`SchedulerConfig::from_env`].
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            profiler: ProfilerCallbacks::default(),
        }
    }

    /// Sets the total number of workers, including the thread that owns
    /// the scheduler.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.config.num_workers = n;
        self
    }

    /// Sets the capacity of each worker's pipe to `2^size_log2` chunks.
    pub fn pipe_size_log2(mut self, size_log2: u32) -> Self {
        self.config.pipe_size_log2 = size_log2;
        self
    }

    /// Sets how many consecutive failed work searches a worker tolerates
    /// before parking.
    pub fn spin_count(mut self, count: u32) -> Self {
        self.config.spin_count = count;
        self
    }

    /// Sets the number of spin hints issued per consecutive failed search.
    pub fn spin_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.config.spin_backoff_multiplier = multiplier;
        self
    }

    /// Caps the number of chunks a submission is initially split into.
    pub fn max_initial_partitions(mut self, max: u32) -> Self {
        self.config.max_initial_partitions = max;
        self
    }

    /// Called on each dedicated worker thread right after it starts.
    pub fn on_thread_start<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.profiler.thread_start = Some(Arc::new(f));
        self
    }

    /// Called on each dedicated worker thread right before it exits.
    pub fn on_thread_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.profiler.thread_stop = Some(Arc::new(f));
        self
    }

    /// Called on a worker right before it parks.
    pub fn on_wait_start<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.profiler.wait_start = Some(Arc::new(f));
        self
    }

    /// Called on a worker right after it wakes from parking.
    pub fn on_wait_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.profiler.wait_stop = Some(Arc::new(f));
        self
    }

    /// Validates the configuration and starts the scheduler.
    pub fn build(self) -> Result<TaskScheduler, SchedulerError> {
        TaskScheduler::start(self.config, self.profiler)
    }
}
