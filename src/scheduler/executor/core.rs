use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::context::TaskContext;
use crate::scheduler::profiler::ProfilerCallbacks;
use crate::scheduler::task::{Completable, PinnedTask, SubTask, TaskSet, TaskSetPartition};
use crate::scheduler::work_stealing::pinned::PinnedList;
use crate::scheduler::work_stealing::pipe::Pipe;

use std::hint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::trace;

/// State shared by every worker of a pool.
///
/// `Shared` implements the scheduling algorithm. Every operation takes
/// the id of the worker issuing it; worker `i` is the only one allowed to
/// push to or pop from `pipes[i]` and to drain `pinned[i]`.
pub(crate) struct Shared {
    /// One chunk pipe per worker.
    pipes: Box<[Pipe<SubTask>]>,

    /// One pinned-task list per worker.
    pinned: Box<[PinnedList]>,

    /// Chunk count a submission is eventually divided into.
    num_partitions: u32,

    /// Chunk count of the first split of a submission.
    num_initial_partitions: u32,

    /// Failed searches before a worker parks.
    spin_count: u32,

    /// Spin hints per consecutive failed search.
    spin_backoff_multiplier: u32,

    /// Cleared to ask dedicated workers to exit.
    running: AtomicBool,

    /// Live workers, including worker 0.
    threads_running: AtomicUsize,

    /// Workers currently registered as parked.
    threads_waiting: AtomicUsize,

    /// Guards the sleep/wake handshake; protects no data.
    sleep_lock: Mutex<()>,

    /// Signalled when new work may be available.
    new_task_event: Condvar,

    /// Instrumentation hooks.
    profiler: ProfilerCallbacks,
}

impl Shared {
    /// Allocates the queues of a pool described by `config`.
    ///
    /// The pool starts with only worker 0 accounted as running.
    pub(crate) fn new(config: &SchedulerConfig, profiler: ProfilerCallbacks) -> Self {
        let workers = config.num_workers;
        let (num_partitions, num_initial_partitions) = config.partitions();

        Self {
            pipes: (0..workers)
                .map(|_| Pipe::with_capacity_log2(config.pipe_size_log2))
                .collect(),
            pinned: (0..workers).map(|_| PinnedList::new()).collect(),
            num_partitions,
            num_initial_partitions,
            spin_count: config.spin_count,
            spin_backoff_multiplier: config.spin_backoff_multiplier,
            running: AtomicBool::new(true),
            threads_running: AtomicUsize::new(1),
            threads_waiting: AtomicUsize::new(0),
            sleep_lock: Mutex::new(()),
            new_task_event: Condvar::new(),
            profiler,
        }
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.pipes.len()
    }

    pub(crate) fn context(&self, worker: usize) -> TaskContext<'_> {
        TaskContext::new(worker, self)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn spin_count(&self) -> u32 {
        self.spin_count
    }

    pub(crate) fn spin_backoff_multiplier(&self) -> u32 {
        self.spin_backoff_multiplier
    }

    pub(crate) fn profiler(&self) -> &ProfilerCallbacks {
        &self.profiler
    }

    pub(crate) fn thread_started(&self) {
        self.threads_running.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn thread_stopped(&self) {
        self.threads_running.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn threads_running(&self) -> usize {
        self.threads_running.load(Ordering::Acquire)
    }

    /// Splits a task set into chunks and queues them on `worker`'s pipe.
    pub(crate) fn add_task_set(&self, worker: usize, task: &Arc<TaskSet>) {
        let set_size = task.set_size();
        let min_range = task.min_range();

        let range_to_run = (set_size / self.num_partitions).max(min_range);
        let range_to_split = (set_size / self.num_initial_partitions).max(min_range);

        task.begin_submission(range_to_run);

        let whole = SubTask::new(task.clone(), TaskSetPartition::new(0, set_size));
        self.split_and_add(worker, whole, range_to_split);

        task.end_submission();
    }

    /// Carves `sub_task` into chunks of `range_to_split` elements and
    /// queues them on `worker`'s pipe.
    ///
    /// A chunk the pipe rejects is executed right here, shrunk to the
    /// task's `range_to_run` first so the producer gets back to queueing
    /// quickly. Nothing is dropped and the pipe never grows.
    fn split_and_add(&self, worker: usize, mut sub_task: SubTask, range_to_split: u32) {
        let mut num_added = 0;

        while !sub_task.partition.is_empty() {
            let chunk = sub_task.split_front(range_to_split);
            chunk.task.chunk_added();
            num_added += 1;

            let Err(mut rejected) = self.push_chunk(worker, chunk) else {
                continue;
            };

            if num_added > 1 {
                self.wake_threads();
            }
            num_added = 0;

            let range_to_run = rejected.task.range_to_run();
            if range_to_run < rejected.partition.len() {
                let end = rejected.partition.start + range_to_run;
                sub_task.partition.start = end;
                rejected.partition.end = end;
            }

            trace!(
                worker,
                start = rejected.partition.start,
                end = rejected.partition.end,
                "pipe full, running chunk inline"
            );
            rejected.execute(&self.context(worker));
        }

        self.wake_threads();
    }

    /// Queues a chunk on `worker`'s pipe, handing it back if it must run
    /// inline instead.
    fn push_chunk(&self, worker: usize, chunk: SubTask) -> Result<(), SubTask> {
        // Nobody could steal it.
        if self.num_workers() == 1 {
            return Err(chunk);
        }

        // Safety: only `worker` pushes to or pops from its own pipe.
        unsafe { self.pipes[worker].push(chunk) }
    }

    /// Runs at most one chunk on behalf of `worker`.
    ///
    /// Pinned tasks are drained first. The worker then pops from its own
    /// pipe and otherwise steals, visiting the other pipes round-robin
    /// from `victim_hint`. The hint is moved to a successful victim so the
    /// next search starts where work was last found.
    ///
    /// Returns `true` if a chunk was executed.
    pub(crate) fn try_run_task(&self, worker: usize, victim_hint: &mut usize) -> bool {
        self.run_pinned_tasks(worker);

        let workers = self.num_workers();

        // Safety: only `worker` pushes to or pops from its own pipe.
        let mut sub_task = unsafe { self.pipes[worker].pop() };
        let mut victim = *victim_hint;
        let mut checked = 0;

        while sub_task.is_none() && checked < workers {
            victim = (*victim_hint + checked) % workers;
            if victim != worker {
                sub_task = self.pipes[victim].steal();
            }
            checked += 1;
        }

        let Some(mut sub_task) = sub_task else {
            return false;
        };
        *victim_hint = victim;

        let ctx = self.context(worker);
        let range_to_run = sub_task.task.range_to_run();

        if range_to_run < sub_task.partition.len() {
            let to_run = sub_task.split_front(range_to_run);
            self.split_and_add(worker, sub_task, range_to_run);
            to_run.execute(&ctx);
        } else {
            sub_task.execute(&ctx);
        }

        true
    }

    /// Queues a pinned task on its target worker and wakes the pool.
    pub(crate) fn add_pinned_task(&self, task: Arc<PinnedTask>) {
        let target = task.worker();
        assert!(
            target < self.num_workers(),
            "pinned task targets worker {target} but the pool has {} workers",
            self.num_workers()
        );

        task.mark_queued();
        self.pinned[target].push(task);
        self.wake_threads();
    }

    /// Executes every task pinned to `worker`, oldest first, including
    /// tasks pinned while draining.
    pub(crate) fn run_pinned_tasks(&self, worker: usize) {
        loop {
            let tasks = self.pinned[worker].take_all();
            if tasks.is_empty() {
                return;
            }

            let ctx = self.context(worker);
            for task in tasks {
                task.execute(&ctx);
            }
        }
    }

    /// Runs work on `worker` until `task` completes, or makes a single
    /// attempt when no task is given.
    pub(crate) fn wait_for_task(&self, worker: usize, task: Option<&dyn Completable>) {
        let mut victim_hint = worker + 1;

        let Some(task) = task else {
            self.try_run_task(worker, &mut victim_hint);
            return;
        };

        while !task.is_complete() {
            if !self.try_run_task(worker, &mut victim_hint) {
                hint::spin_loop();
            }
        }
    }

    /// Runs work on `worker` until the pool is quiescent.
    ///
    /// Empty queues alone do not prove completion, since a running chunk
    /// may still be about to submit more. The pool is quiescent once the
    /// queues are empty and every other live worker is parked.
    pub(crate) fn wait_for_all(&self, worker: usize) {
        let mut victim_hint = worker + 1;
        let others = self.threads_running().saturating_sub(1);
        let mut have_tasks = true;

        while have_tasks || self.threads_waiting.load(Ordering::SeqCst) < others {
            have_tasks = self.try_run_task(worker, &mut victim_hint) || self.has_queued_work();

            if !have_tasks {
                hint::spin_loop();
            }
        }
    }

    /// Parks `worker` until new work is signalled.
    ///
    /// The waiter count is raised before the queues are checked, so a
    /// producer that pushes after the check is guaranteed to see it and
    /// signal. The check is repeated under the sleep lock, which
    /// producers take to notify, so the signal cannot fall between the
    /// check and the wait.
    pub(crate) fn wait_for_new_tasks(&self, worker: usize) {
        self.threads_waiting.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        if !self.has_work_for(worker) {
            self.profiler.wait_start(worker);
            trace!(worker, "worker parking");

            {
                let guard = self
                    .sleep_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);

                if self.is_running() && !self.has_work_for(worker) {
                    let _guard = self
                        .new_task_event
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }

            trace!(worker, "worker unparked");
            self.profiler.wait_stop(worker);
        }

        self.threads_waiting.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wakes parked workers, if any.
    pub(crate) fn wake_threads(&self) {
        // Pairs with the fence in `wait_for_new_tasks`.
        fence(Ordering::SeqCst);

        if self.threads_waiting.load(Ordering::SeqCst) > 0 {
            self.notify_all();
        }
    }

    /// Asks dedicated workers to exit and wakes them.
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.notify_all();
    }

    pub(crate) fn notify_all(&self) {
        let _guard = self
            .sleep_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.new_task_event.notify_all();
    }

    fn has_work_for(&self, worker: usize) -> bool {
        !self.pinned[worker].is_empty() || self.pipes.iter().any(|pipe| !pipe.is_empty())
    }

    fn has_queued_work(&self) -> bool {
        self.pipes.iter().any(|pipe| !pipe.is_empty())
            || self.pinned.iter().any(|list| !list.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::Shared;
    use crate::scheduler::config::SchedulerConfig;
    use crate::scheduler::profiler::ProfilerCallbacks;
    use crate::scheduler::task::{Completable, TaskSet};

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn shared(workers: usize, pipe_size_log2: u32) -> Shared {
        let config = SchedulerConfig {
            num_workers: workers,
            pipe_size_log2,
            ..SchedulerConfig::default()
        };
        Shared::new(&config, ProfilerCallbacks::default())
    }

    fn counting_task(set_size: u32, min_range: u32, total: Arc<AtomicU32>) -> Arc<TaskSet> {
        Arc::new(
            TaskSet::new(set_size, move |range, _| {
                total.fetch_add(range.len(), Ordering::Relaxed);
            })
            .with_min_range(min_range),
        )
    }

    #[test]
    fn submission_queues_initial_chunks() {
        // 4 workers: 12 steady partitions, 3 initial.
        let shared = shared(4, 8);
        let total = Arc::new(AtomicU32::new(0));
        let task = counting_task(1_200, 1, total.clone());

        shared.add_task_set(0, &task);

        assert_eq!(task.range_to_run(), 100);
        assert_eq!(task.running_count(), 3);
        assert_eq!(shared.pipes[0].len(), 3);
        assert_eq!(total.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn claimed_chunk_is_split_down_to_range_to_run() {
        let shared = shared(4, 8);
        let total = Arc::new(AtomicU32::new(0));
        let task = counting_task(1_200, 1, total.clone());

        shared.add_task_set(0, &task);

        let mut hint = 1;
        assert!(shared.try_run_task(0, &mut hint));

        // One 400-element chunk became 100 run + 3 requeued.
        assert_eq!(total.load(Ordering::Relaxed), 100);
        assert_eq!(shared.pipes[0].len(), 5);

        shared.wait_for_task(0, Some(task.as_ref()));
        assert_eq!(total.load(Ordering::Relaxed), 1_200);
        assert!(shared.pipes[0].is_empty());
    }

    #[test]
    fn full_pipe_runs_chunks_inline() {
        // 4 workers with two-slot pipes: three initial chunks of 4, the
        // third is rejected and run inline one element at a time.
        let shared = shared(4, 1);
        let total = Arc::new(AtomicU32::new(0));
        let task = counting_task(12, 1, total.clone());

        shared.add_task_set(0, &task);

        assert_eq!(total.load(Ordering::Relaxed), 4);
        assert_eq!(shared.pipes[0].len(), 2);
        assert_eq!(task.running_count(), 2);

        let mut hint = 1;
        while shared.try_run_task(0, &mut hint) {}

        assert!(task.is_complete());
        assert_eq!(total.load(Ordering::Relaxed), 12);
    }

    #[test]
    fn single_worker_runs_at_submission() {
        let shared = shared(1, 8);
        let total = Arc::new(AtomicU32::new(0));
        let task = counting_task(500, 7, total.clone());

        shared.add_task_set(0, &task);

        assert!(task.is_complete());
        assert_eq!(total.load(Ordering::Relaxed), 500);
        assert!(shared.pipes[0].is_empty());
    }

    #[test]
    fn yield_without_task_runs_one_chunk() {
        let shared = shared(3, 8);
        let total = Arc::new(AtomicU32::new(0));
        // 3 workers: 6 steady partitions, 2 initial; chunks of 3 need no resplit.
        let task = counting_task(6, 3, total.clone());

        shared.add_task_set(0, &task);
        assert_eq!(shared.pipes[0].len(), 2);

        shared.wait_for_task(0, None);
        assert_eq!(total.load(Ordering::Relaxed), 3);
        assert!(!task.is_complete());
    }
}
