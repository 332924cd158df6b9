// Copyright © 2024 Pathway

//! Storage for materialized snapshots.

pub mod backends;

pub use self::backends::{Error, FilesystemSnapshotStore, MemorySnapshotStore, SnapshotStore};
