// Copyright © 2024 Pathway

//! Boundaries to the outside world: where deltas come from and where the
//! pre-merge stream goes.

use std::any::type_name;

use crate::engine::error::DynResult;
use crate::engine::{TimeSpan, Timestamp};

pub mod memory;

pub use memory::{MemorySink, MemorySource};

/// Yields the timestamped values produced within a time span.
pub trait Source<T>: Send + Sync {
    /// Every returned timestamp must be contained in `span`.
    fn read(&self, span: &TimeSpan) -> DynResult<Vec<(Timestamp, T)>>;

    fn name(&self) -> String {
        short_type_name::<Self>()
    }
}

/// Durably accepts the timestamped values computed for a time span.
pub trait Sink<T>: Send + Sync {
    fn write(&self, span: &TimeSpan, entries: Vec<(Timestamp, T)>) -> DynResult<()>;

    fn name(&self) -> String {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full_name = type_name::<T>();
    let without_generics = full_name.split('<').next().unwrap_or(full_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}
