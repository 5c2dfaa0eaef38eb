use crate::error::ConfigError;

use serde::{Deserialize, Serialize};

use std::env;
use std::str::FromStr;
use std::thread;

pub use crate::scheduler::work_stealing::pipe::{MAX_PIPE_SIZE_LOG2, MIN_PIPE_SIZE_LOG2};

/// Default per-worker pipe capacity exponent (256 chunks).
pub const DEFAULT_PIPE_SIZE_LOG2: u32 = 8;

/// Default number of failed work searches before a worker parks.
pub const DEFAULT_SPIN_COUNT: u32 = 100;

/// Default spin-wait iterations per failed search.
pub const DEFAULT_SPIN_BACKOFF_MULTIPLIER: u32 = 10;

/// Default cap on the number of chunks a submission is first split into.
pub const DEFAULT_MAX_INITIAL_PARTITIONS: u32 = 8;

/// Environment variable prefix used by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "TASKPIPE_";

/// Tunable scheduler parameters.
///
/// Usually built through [`SchedulerBuilder`](crate::SchedulerBuilder);
/// it can also be loaded from the environment or embedded in an
/// application's own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Total number of workers, including the thread owning the scheduler.
    pub num_workers: usize,

    /// Capacity of each worker's pipe, as a power of two.
    pub pipe_size_log2: u32,

    /// Failed work searches tolerated before parking.
    pub spin_count: u32,

    /// Spin-wait hints issued per consecutive failed search.
    pub spin_backoff_multiplier: u32,

    /// Upper bound on the initial split count of a submission.
    pub max_initial_partitions: u32,
}

impl Default for SchedulerConfig {
    /// One worker per logical CPU, falling back to `1` if unavailable.
    fn default() -> Self {
        let num_workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            num_workers,
            pipe_size_log2: DEFAULT_PIPE_SIZE_LOG2,
            spin_count: DEFAULT_SPIN_COUNT,
            spin_backoff_multiplier: DEFAULT_SPIN_BACKOFF_MULTIPLIER,
            max_initial_partitions: DEFAULT_MAX_INITIAL_PARTITIONS,
        }
    }
}

impl SchedulerConfig {
    /// Builds a configuration from `TASKPIPE_*` environment variables.
    ///
    /// Unset or empty variables keep their default. Recognized keys:
    /// `TASKPIPE_NUM_WORKERS`, `TASKPIPE_PIPE_SIZE_LOG2`,
    /// `TASKPIPE_SPIN_COUNT`, `TASKPIPE_SPIN_BACKOFF_MULTIPLIER` and
    /// `TASKPIPE_MAX_INITIAL_PARTITIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// `lookup` receives fully prefixed keys such as
    /// `TASKPIPE_NUM_WORKERS`. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_with(&lookup, "NUM_WORKERS", &mut config.num_workers)?;
        override_with(&lookup, "PIPE_SIZE_LOG2", &mut config.pipe_size_log2)?;
        override_with(&lookup, "SPIN_COUNT", &mut config.spin_count)?;
        override_with(
            &lookup,
            "SPIN_BACKOFF_MULTIPLIER",
            &mut config.spin_backoff_multiplier,
        )?;
        override_with(
            &lookup,
            "MAX_INITIAL_PARTITIONS",
            &mut config.max_initial_partitions,
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        if !(MIN_PIPE_SIZE_LOG2..=MAX_PIPE_SIZE_LOG2).contains(&self.pipe_size_log2) {
            return Err(ConfigError::PipeSizeOutOfRange(self.pipe_size_log2));
        }

        if self.max_initial_partitions == 0 {
            return Err(ConfigError::ZeroInitialPartitions);
        }

        Ok(())
    }

    /// Chunk counts used to split submissions: `(steady, initial)`.
    ///
    /// A single worker runs everything sequentially. Otherwise the steady
    /// state aims for `n * (n - 1)` chunks so stolen work can keep being
    /// divided, while the first split is coarser to keep submission cheap
    /// and still give each dedicated worker something to steal.
    pub(crate) fn partitions(&self) -> (u32, u32) {
        let workers = self.num_workers as u32;

        if workers <= 1 {
            (1, 1)
        } else {
            let steady = workers.saturating_mul(workers - 1);
            let initial = (workers - 1).min(self.max_initial_partitions);
            (steady, initial)
        }
    }
}

fn override_with<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{ENV_PREFIX}{key}");

    let Some(raw) = lookup(&key).filter(|v| !v.trim().is_empty()) else {
        return Ok(());
    };

    *slot = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value: raw })?;

    Ok(())
}
