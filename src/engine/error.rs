// Copyright © 2024 Pathway

use std::error;
use std::result;

use super::dataflow::config::Error as ConfigError;
use super::{TimeSpan, Timestamp};
use crate::persistence::Error as PersistenceError;

#[allow(clippy::module_name_repetitions)]
pub type DynError = Box<dyn error::Error + Send + Sync>;
pub type DynResult<T> = result::Result<T, DynError>;

/// Failures of a merge call. Apart from `Persistence`, `Config` and
/// `Other`, every variant reports a programming error: either a broken
/// contract of the caller or a defect of the engine itself. None of them
/// is worth retrying.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("empty time span [{start}, {end})")]
    EmptyTimeSpan { start: Timestamp, end: Timestamp },

    #[error("delta for key {key} at {timestamp} lies outside of time span {span}")]
    TimestampOutOfSpan {
        key: String,
        timestamp: Timestamp,
        span: TimeSpan,
    },

    #[error("duplicate key in snapshot: {0}")]
    DuplicateKey(String),

    #[error("key {key} received {count} deltas, the limit for non-commutative merges is {limit}")]
    TooManyDeltas {
        key: String,
        count: usize,
        limit: usize,
    },

    #[error("internal invariant violated for key {key}: {reason}")]
    InvariantViolation { key: String, reason: &'static str },

    #[error("empty fold for key {0}")]
    EmptyFold(String),

    #[error("snapshot store failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(DynError),
}

impl Error {
    pub(crate) fn invariant_violation(key: &impl std::fmt::Debug, reason: &'static str) -> Self {
        Self::InvariantViolation {
            key: format!("{key:?}"),
            reason,
        }
    }

    pub fn downcast<E: error::Error + 'static>(self) -> Result<E, Self> {
        match self {
            Self::Other(inner) => match inner.downcast::<E>() {
                Ok(error) => Ok(*error),
                Err(other) => Err(Self::Other(other)),
            },
            other => Err(other),
        }
    }
}

impl From<DynError> for Error {
    fn from(value: DynError) -> Self {
        match value.downcast::<Self>() {
            Ok(this) => *this,
            Err(other) => Self::Other(other),
        }
    }
}

pub type Result<T, E = Error> = result::Result<T, E>;
