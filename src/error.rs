use std::io;

use thiserror::Error;

/// Invalid scheduler configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    #[error("pipe size log2 {0} is outside the supported range {min}..={max}",
        min = crate::scheduler::config::MIN_PIPE_SIZE_LOG2,
        max = crate::scheduler::config::MAX_PIPE_SIZE_LOG2)]
    PipeSizeOutOfRange(u32),

    #[error("max initial partitions must be greater than zero")]
    ZeroInitialPartitions,

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Errors raised while starting a scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker thread {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
}
