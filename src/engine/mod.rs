// too sensitive for generic collection signatures
#![allow(clippy::type_complexity)]

pub mod error;
pub use self::error::{Error, Result};

pub mod timestamp;
pub use self::timestamp::{TimeSpan, Timestamp};

pub mod semigroup;
pub use self::semigroup::{
    semigroup_fn, Concat, First, FnSemigroup, Last, Max, Min, Semigroup, Sum,
};

pub mod commutativity;
pub use self::commutativity::{Commutativity, ParseCommutativityError};

pub mod dataflow;
pub use dataflow::{Config, Data, ExchangeKey, PartitionedCollection, RayonSubstrate, Substrate};

pub mod merge;
pub use merge::{
    combine_deltas, join_snapshot, Delta, MergeEngine, MergeResult, PreMergeEntry, WriteAction,
};

pub mod window;
pub use window::{merge_window, PreMergeRecord, WindowStats};
