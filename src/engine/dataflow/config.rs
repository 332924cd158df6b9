// Copyright © 2024 Pathway

use std::num::NonZeroUsize;
use std::thread::available_parallelism;

use log::warn;

use crate::env::{
    parse_env_var, parse_env_var_or, Error as EnvError, MAX_DELTAS_PER_KEY_VAR, PARTITIONS_VAR,
    THREADS_VAR,
};

const MAX_THREADS: usize = 256;

/// Bound on the number of deltas a single key may receive within one
/// non-commutative merge. Each key's deltas are held in memory at once.
pub const DEFAULT_MAX_DELTAS_PER_KEY: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("can't run with no threads")]
    NeedsThreads,

    #[error("can't run with no partitions")]
    NeedsPartitions,

    #[error("the limit of deltas per key must be positive")]
    NeedsDeltaLimit,

    #[error("failed to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    EnvError(#[from] EnvError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    threads: usize,
    partitions: usize,
    max_deltas_per_key: Option<usize>,
}

impl Config {
    pub fn new(threads: usize, partitions: usize) -> Result<Self, Error> {
        if threads == 0 {
            return Err(Error::NeedsThreads);
        }
        if partitions == 0 {
            return Err(Error::NeedsPartitions);
        }
        if partitions < threads {
            warn!("{partitions} partitions are fewer than {threads} threads, some threads will stay idle");
        }
        Ok(Self {
            threads,
            partitions,
            max_deltas_per_key: Some(DEFAULT_MAX_DELTAS_PER_KEY),
        })
    }

    /// `None` lifts the bound altogether.
    #[must_use]
    pub fn with_max_deltas_per_key(mut self, limit: Option<usize>) -> Self {
        self.max_deltas_per_key = limit;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn max_deltas_per_key(&self) -> Option<usize> {
        self.max_deltas_per_key
    }

    pub fn from_env() -> Result<Self, Error> {
        let default_threads = available_parallelism().map_or(1, NonZeroUsize::get);
        let mut threads: usize = parse_env_var_or(THREADS_VAR, default_threads)?;
        if threads > MAX_THREADS {
            warn!("{threads} is greater than the maximum allowed number of threads ({MAX_THREADS}), reducing");
            threads = MAX_THREADS;
        }
        let partitions: usize = parse_env_var_or(PARTITIONS_VAR, threads)?;
        let max_deltas_per_key = match parse_env_var::<usize>(MAX_DELTAS_PER_KEY_VAR)? {
            Some(0) => return Err(Error::NeedsDeltaLimit),
            Some(limit) => Some(limit),
            None => Some(DEFAULT_MAX_DELTAS_PER_KEY),
        };
        Ok(Self::new(threads, partitions)?.with_max_deltas_per_key(max_deltas_per_key))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            partitions: 1,
            max_deltas_per_key: Some(DEFAULT_MAX_DELTAS_PER_KEY),
        }
    }
}
