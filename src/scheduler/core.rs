use super::config::SchedulerConfig;
use super::context::TaskContext;
use super::executor::core::Shared;
use super::executor::worker::Worker;
use super::profiler::ProfilerCallbacks;
use super::task::{Completable, PinnedTask, TaskSet};
use crate::error::SchedulerError;

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// The main scheduler handle.
///
/// `TaskScheduler` is responsible for:
/// - starting and stopping the pool of worker threads,
/// - accepting task sets and pinned tasks,
/// - letting the owning thread take part in execution while it waits.
///
/// The thread owning the handle is worker 0 of the pool: submissions
/// made through the handle are queued on worker 0's pipe and waits make
/// it execute work. The handle can move to another thread but cannot be
/// shared between threads. Code running inside tasks uses the
/// [`TaskContext`] it is given instead.
///
/// Dropping the scheduler shuts it down.
pub struct TaskScheduler {
    /// The running pool, absent after shutdown.
    pool: Option<Pool>,

    /// Configuration used to (re)start the pool.
    config: SchedulerConfig,

    /// Hooks handed to every pool.
    profiler: ProfilerCallbacks,

    /// The handle acts as worker 0 and must not be used concurrently.
    _not_sync: PhantomData<Cell<()>>,
}

impl TaskScheduler {
    /// Starts a scheduler described by `config`.
    pub(crate) fn start(
        config: SchedulerConfig,
        profiler: ProfilerCallbacks,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let pool = Pool::start(&config, profiler.clone())?;

        Ok(Self {
            pool: Some(pool),
            config,
            profiler,
            _not_sync: PhantomData,
        })
    }

    /// Restarts the scheduler with `num_workers` workers.
    ///
    /// Any running pool is stopped first; as with
    /// [`shutdown`](Self::shutdown), all submitted work must have been
    /// waited for.
    ///
    /// # Panics
    ///
    /// Panics if `num_workers == 0`.
    pub fn initialize(&mut self, num_workers: usize) -> Result<(), SchedulerError> {
        assert!(num_workers > 0, "num_workers must be > 0");

        self.shutdown();
        self.config.num_workers = num_workers;
        self.pool = Some(Pool::start(&self.config, self.profiler.clone())?);

        Ok(())
    }

    /// Returns `true` until the scheduler is shut down.
    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Total number of workers, including the owning thread.
    ///
    /// Returns `0` after shutdown.
    pub fn num_workers(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(0, |pool| pool.shared.num_workers())
    }

    /// Configuration the scheduler was started with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execution context of worker 0, the thread owning the scheduler.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler has been shut down.
    pub fn context(&self) -> TaskContext<'_> {
        self.shared().context(0)
    }

    /// Splits `task` into chunks and queues them for parallel execution.
    ///
    /// Returns immediately after queueing; with a single worker the task
    /// has already run to completion.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let task = Arc::new(TaskSet::new(4_096, |range, _| work(range)));
    /// scheduler.add_task_set(&task);
    /// scheduler.wait_for_task(Some(task.as_ref()));
    /// ```
    pub fn add_task_set(&self, task: &Arc<TaskSet>) {
        self.shared().add_task_set(0, task);
    }

    /// Queues `task` to run on its target worker.
    ///
    /// # Panics
    ///
    /// Panics if the target worker does not exist.
    pub fn add_pinned_task(&self, task: Arc<PinnedTask>) {
        self.shared().add_pinned_task(task);
    }

    /// Runs every task currently pinned to worker 0.
    pub fn run_pinned_tasks(&self) {
        self.shared().run_pinned_tasks(0);
    }

    /// Executes work until `task` completes.
    ///
    /// With `None`, makes a single attempt to run one piece of work and
    /// returns.
    pub fn wait_for_task(&self, task: Option<&dyn Completable>) {
        self.shared().wait_for_task(0, task);
    }

    /// Executes work until every queue is empty and every other worker
    /// is idle.
    pub fn wait_for_all(&self) {
        self.shared().wait_for_all(0);
    }

    /// Waits for all work, then shuts the scheduler down.
    pub fn wait_for_all_and_shutdown(&mut self) {
        if self.is_running() {
            self.wait_for_all();
        }
        self.shutdown();
    }

    /// Stops and joins every worker thread and releases the queues.
    ///
    /// Work still queued is dropped without running, so callers should
    /// [`wait_for_all`](Self::wait_for_all) first. Calling `shutdown` on
    /// a stopped scheduler does nothing.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.stop();
        }
    }

    fn shared(&self) -> &Shared {
        &self
            .pool
            .as_ref()
            .expect("task scheduler has been shut down")
            .shared
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A started set of workers.
struct Pool {
    /// State shared with the dedicated workers.
    shared: Arc<Shared>,

    /// Dedicated worker threads, in creation order.
    handles: Vec<JoinHandle<()>>,
}

impl Pool {
    /// Allocates the queues and spawns workers `1..num_workers`.
    ///
    /// If a thread cannot be spawned, the workers already started are
    /// stopped before the error is returned.
    fn start(config: &SchedulerConfig, profiler: ProfilerCallbacks) -> Result<Self, SchedulerError> {
        let workers = config.num_workers;

        let mut pool = Self {
            shared: Arc::new(Shared::new(config, profiler)),
            handles: Vec::with_capacity(workers.saturating_sub(1)),
        };

        for id in 1..workers {
            pool.shared.thread_started();
            let worker = Worker::new(id, pool.shared.clone());

            let spawned = thread::Builder::new()
                .name(format!("taskpipe-worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    pool.shared.thread_stopped();
                    pool.stop();
                    return Err(SchedulerError::Spawn { worker: id, source });
                }
            }
        }

        debug!(workers, "task scheduler started");
        Ok(pool)
    }

    /// Signals shutdown, waits for every worker to observe it, then joins
    /// the threads in reverse creation order.
    fn stop(mut self) {
        self.shared.stop();

        while self.shared.threads_running() > 1 {
            self.shared.notify_all();
            thread::yield_now();
        }

        for handle in self.handles.drain(..).rev() {
            if handle.join().is_err() {
                warn!("worker thread terminated by panic");
            }
        }

        debug!("task scheduler stopped");
    }
}
