use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use taskpipe::{
    Completable, ConfigError, PinnedTask, SchedulerBuilder, SchedulerConfig, SchedulerError,
    TaskSet,
};

#[test]
fn test_recursive_submission_completes() {
    let scheduler = SchedulerBuilder::new().worker_threads(4).build().unwrap();

    let tally = Arc::new(AtomicU64::new(0));
    let inner_tasks = Arc::new(Mutex::new(Vec::new()));

    let outer = {
        let tally = tally.clone();
        let inner_tasks = inner_tasks.clone();
        Arc::new(
            TaskSet::new(10_000, move |range, ctx| {
                tally.fetch_add(u64::from(range.len()), Ordering::Relaxed);

                let inner_tally = tally.clone();
                let inner = Arc::new(TaskSet::new(1_000, move |r, _| {
                    inner_tally.fetch_add(u64::from(r.len()), Ordering::Relaxed);
                }));

                ctx.add_task_set(&inner);
                inner_tasks.lock().unwrap().push(inner);
            })
            .with_min_range(100),
        )
    };

    scheduler.add_task_set(&outer);
    scheduler.wait_for_all();

    assert!(outer.is_complete());

    let inner_tasks = inner_tasks.lock().unwrap();
    assert!(!inner_tasks.is_empty());
    assert!(inner_tasks.iter().all(|task| task.is_complete()));
    assert_eq!(
        tally.load(Ordering::Relaxed),
        10_000 + 1_000 * inner_tasks.len() as u64
    );
}

#[test]
fn test_concurrent_small_submissions() {
    const WORKERS: usize = 4;
    const TASKS_PER_WORKER: u32 = 200;

    let scheduler = SchedulerBuilder::new()
        .worker_threads(WORKERS)
        .build()
        .unwrap();

    let tally = Arc::new(AtomicU64::new(0));
    let expected = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let tally = tally.clone();
            let expected = expected.clone();

            Arc::new(PinnedTask::new(worker, move |ctx| {
                let mut tasks = Vec::new();

                for i in 0..TASKS_PER_WORKER {
                    // Always below the minimum range: one chunk per task.
                    let set_size = 1 + i % 63;
                    let hits = Arc::new(AtomicU64::new(0));
                    let task_hits = hits.clone();
                    let task_tally = tally.clone();

                    let task = Arc::new(
                        TaskSet::new(set_size, move |range, _| {
                            task_hits.fetch_add(u64::from(range.len()), Ordering::Relaxed);
                            task_tally.fetch_add(u64::from(range.len()), Ordering::Relaxed);
                        })
                        .with_min_range(64),
                    );

                    expected.fetch_add(u64::from(set_size), Ordering::Relaxed);
                    ctx.add_task_set(&task);
                    tasks.push((task, hits));
                }

                for (task, hits) in &tasks {
                    ctx.wait_for_task(Some(task.as_ref()));
                    assert_eq!(hits.load(Ordering::Relaxed), u64::from(task.set_size()));
                }
            }))
        })
        .collect();

    for producer in &producers {
        scheduler.add_pinned_task(producer.clone());
    }
    scheduler.wait_for_all();

    for producer in &producers {
        scheduler.wait_for_task(Some(producer.as_ref()));
        assert!(producer.is_complete());
    }
    assert_eq!(
        tally.load(Ordering::Relaxed),
        expected.load(Ordering::Relaxed)
    );
}

#[test]
fn test_wait_for_all_on_idle_scheduler_returns() {
    let scheduler = SchedulerBuilder::new().worker_threads(3).build().unwrap();

    scheduler.wait_for_all();
    scheduler.wait_for_all();
}

#[test]
fn test_shutdown_joins_workers_and_releases_tasks() {
    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));

    let mut scheduler = {
        let starts = starts.clone();
        let stops = stops.clone();
        SchedulerBuilder::new()
            .worker_threads(4)
            .on_thread_start(move |_| {
                starts.fetch_add(1, Ordering::SeqCst);
            })
            .on_thread_stop(move |_| {
                stops.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    };

    let task = Arc::new(TaskSet::new(50_000, |_, _| {}));
    scheduler.add_task_set(&task);
    scheduler.wait_for_all();
    assert!(task.is_complete());

    scheduler.shutdown();

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.num_workers(), 0);
    assert_eq!(starts.load(Ordering::SeqCst), 3);
    assert_eq!(stops.load(Ordering::SeqCst), 3);

    // No queue or worker still references the task.
    assert_eq!(Arc::strong_count(&task), 1);

    // A second shutdown does nothing.
    scheduler.shutdown();
}

#[test]
fn test_wait_for_all_and_shutdown() {
    let mut scheduler = SchedulerBuilder::new().worker_threads(2).build().unwrap();
    let total = Arc::new(AtomicU64::new(0));

    let task = {
        let total = total.clone();
        Arc::new(TaskSet::new(8_192, move |range, _| {
            total.fetch_add(u64::from(range.len()), Ordering::Relaxed);
        }))
    };

    scheduler.add_task_set(&task);
    scheduler.wait_for_all_and_shutdown();

    assert!(!scheduler.is_running());
    assert_eq!(total.load(Ordering::Relaxed), 8_192);
}

#[test]
fn test_wait_hooks_fire_when_workers_park() {
    let wait_starts = Arc::new(AtomicUsize::new(0));
    let wait_stops = Arc::new(AtomicUsize::new(0));

    let mut scheduler = {
        let wait_starts = wait_starts.clone();
        let wait_stops = wait_stops.clone();
        SchedulerBuilder::new()
            .worker_threads(2)
            .spin_count(0)
            .on_wait_start(move |worker| {
                assert_ne!(worker, 0);
                wait_starts.fetch_add(1, Ordering::SeqCst);
            })
            .on_wait_stop(move |_| {
                wait_stops.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    while wait_starts.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "worker never parked");
        thread::sleep(Duration::from_millis(1));
    }

    scheduler.shutdown();

    assert!(wait_stops.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        wait_starts.load(Ordering::SeqCst),
        wait_stops.load(Ordering::SeqCst)
    );
}

#[test]
fn test_parked_workers_wake_for_new_work() {
    let scheduler = SchedulerBuilder::new()
        .worker_threads(3)
        .spin_count(0)
        .build()
        .unwrap();

    // Let the dedicated workers go to sleep.
    thread::sleep(Duration::from_millis(20));

    let runs = Arc::new(AtomicUsize::new(0));
    let task = {
        let runs = runs.clone();
        Arc::new(PinnedTask::new(2, move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
        }))
    };

    scheduler.add_pinned_task(task.clone());
    scheduler.wait_for_task(Some(task.as_ref()));

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_initialize_restarts_the_pool() {
    let mut scheduler = SchedulerBuilder::new().worker_threads(2).build().unwrap();
    assert_eq!(scheduler.num_workers(), 2);

    scheduler.initialize(5).unwrap();
    assert!(scheduler.is_running());
    assert_eq!(scheduler.num_workers(), 5);
    assert_eq!(scheduler.context().num_workers(), 5);

    let total = Arc::new(AtomicU64::new(0));
    let task = {
        let total = total.clone();
        Arc::new(TaskSet::new(1_000, move |range, _| {
            total.fetch_add(u64::from(range.len()), Ordering::Relaxed);
        }))
    };
    scheduler.add_task_set(&task);
    scheduler.wait_for_task(Some(task.as_ref()));
    assert_eq!(total.load(Ordering::Relaxed), 1_000);

    scheduler.shutdown();
    scheduler.initialize(1).unwrap();
    assert_eq!(scheduler.num_workers(), 1);
}

#[test]
fn test_owner_context_is_worker_zero() {
    let scheduler = SchedulerBuilder::new().worker_threads(3).build().unwrap();
    let ctx = scheduler.context();

    assert_eq!(ctx.worker_id(), 0);
    assert_eq!(ctx.num_workers(), 3);
}

#[test]
#[should_panic(expected = "worker_threads must be > 0")]
fn test_zero_worker_threads_panics() {
    let _ = SchedulerBuilder::new().worker_threads(0);
}

#[test]
#[should_panic(expected = "num_workers must be > 0")]
fn test_initialize_with_zero_workers_panics() {
    let mut scheduler = SchedulerBuilder::new().worker_threads(1).build().unwrap();
    let _ = scheduler.initialize(0);
}

#[test]
fn test_build_rejects_invalid_config() {
    let err = SchedulerBuilder::new()
        .worker_threads(2)
        .pipe_size_log2(0)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SchedulerError::Config(ConfigError::PipeSizeOutOfRange(0))
    ));

    let err = SchedulerBuilder::new()
        .max_initial_partitions(0)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SchedulerError::Config(ConfigError::ZeroInitialPartitions)
    ));

    let config = SchedulerConfig {
        num_workers: 0,
        ..SchedulerConfig::default()
    };
    let err = SchedulerBuilder::from_config(config).build().err().unwrap();
    assert_eq!(err.to_string(), "invalid configuration: worker count must be greater than zero");
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: SchedulerConfig =
        serde_json::from_str(r#"{ "num_workers": 3, "spin_count": 5 }"#).unwrap();

    assert_eq!(config.num_workers, 3);
    assert_eq!(config.spin_count, 5);
    assert_eq!(config.pipe_size_log2, taskpipe::DEFAULT_PIPE_SIZE_LOG2);

    let scheduler = SchedulerBuilder::from_config(config).build().unwrap();
    assert_eq!(scheduler.num_workers(), 3);
    assert_eq!(scheduler.config().spin_count, 5);
}
