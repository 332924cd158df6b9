// Copyright © 2024 Pathway

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::debug;

use super::{check_monotonic, select_version, Error, SnapshotStore};
use crate::engine::{TimeSpan, Timestamp};

/// Keeps every persisted version in memory. Meant for tests and for
/// stores small enough to be rebuilt on restart.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct MemorySnapshotStore<K, V> {
    versions: Mutex<BTreeMap<Timestamp, Vec<(K, V)>>>,
}

impl<K, V> Default for MemorySnapshotStore<K, V> {
    fn default() -> Self {
        Self {
            versions: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<K, V> MemorySnapshotStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `entries` as of `as_of`.
    pub fn with_initial(as_of: Timestamp, entries: Vec<(K, V)>) -> Self {
        Self {
            versions: Mutex::new(BTreeMap::from([(as_of, entries)])),
        }
    }

    pub fn versions(&self) -> Vec<Timestamp> {
        self.versions.lock().unwrap().keys().copied().collect()
    }
}

impl<K: Clone, V: Clone> MemorySnapshotStore<K, V> {
    pub fn latest(&self) -> Option<(Timestamp, Vec<(K, V)>)> {
        self.versions
            .lock()
            .unwrap()
            .last_key_value()
            .map(|(as_of, entries)| (*as_of, entries.clone()))
    }
}

impl<K, V> SnapshotStore<K, V> for MemorySnapshotStore<K, V>
where
    K: Clone + Send,
    V: Clone + Send,
{
    fn snapshot(&self, span: &TimeSpan) -> Result<Vec<(K, V)>, Error> {
        let versions = self.versions.lock().unwrap();
        let Some(as_of) = select_version(versions.keys().copied(), span)? else {
            return Ok(Vec::new());
        };
        Ok(versions.get(&as_of).cloned().unwrap_or_default())
    }

    fn persist(&self, span: &TimeSpan, entries: Vec<(K, V)>) -> Result<(), Error> {
        let mut versions = self.versions.lock().unwrap();
        check_monotonic(versions.keys().next_back().copied(), span.end())?;
        debug!(
            "Storing {} snapshot entries as of {}",
            entries.len(),
            span.end()
        );
        versions.insert(span.end(), entries);
        Ok(())
    }
}
