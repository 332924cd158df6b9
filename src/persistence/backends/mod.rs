// Copyright © 2024 Pathway

use std::io::Error as IoError;

use bincode::Error as BincodeError;
use glob::{GlobError, PatternError};

use crate::engine::{TimeSpan, Timestamp};

pub use file::FilesystemSnapshotStore;
pub use memory::MemorySnapshotStore;

pub mod file;
pub mod memory;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Bincode(#[from] BincodeError),

    #[error(transparent)]
    GlobPattern(#[from] PatternError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("path is not UTF-8 encoded")]
    PathIsNotUtf8,

    #[error("snapshot file name {0:?} is incorrectly formatted")]
    IncorrectSnapshotName(String),

    #[error("snapshot as of {as_of} already covers a part of time span {span}")]
    SnapshotOverlapsSpan { as_of: Timestamp, span: TimeSpan },

    #[error("snapshot as of {as_of} is not newer than the latest stored snapshot as of {latest}")]
    NonMonotonicSnapshot { as_of: Timestamp, latest: Timestamp },
}

/// Keeps full, deduplicated snapshots of a store.
///
/// A snapshot persisted for a span is tagged with the end of that span.
pub trait SnapshotStore<K, V>: Send + Sync {
    /// The state as of the end of `span`, before any of the span's deltas
    /// are applied: the newest version not later than `span.end()`. Keys
    /// are unique. A store without versions returns an empty snapshot.
    fn snapshot(&self, span: &TimeSpan) -> Result<Vec<(K, V)>, Error>;

    /// Atomically stores `entries` as the version as of `span.end()`.
    fn persist(&self, span: &TimeSpan, entries: Vec<(K, V)>) -> Result<(), Error>;
}

/// Picks the version `snapshot(span)` must read from the as-of timestamps
/// of the stored versions.
pub fn select_version(
    versions: impl IntoIterator<Item = Timestamp>,
    span: &TimeSpan,
) -> Result<Option<Timestamp>, Error> {
    let newest = versions
        .into_iter()
        .filter(|as_of| *as_of <= span.end())
        .max();
    match newest {
        Some(as_of) if as_of > span.start() => Err(Error::SnapshotOverlapsSpan {
            as_of,
            span: *span,
        }),
        newest => Ok(newest),
    }
}

/// Refuses versions that would not become the newest one.
pub fn check_monotonic(latest: Option<Timestamp>, as_of: Timestamp) -> Result<(), Error> {
    match latest {
        Some(latest) if latest >= as_of => Err(Error::NonMonotonicSnapshot { as_of, latest }),
        _ => Ok(()),
    }
}
