// Copyright © 2024 Pathway

use std::collections::BTreeMap;

use batchstore_engine::engine::{
    Config, Delta, PartitionedCollection, RayonSubstrate, Substrate, TimeSpan,
};

pub fn span(start: u64, end: u64) -> TimeSpan {
    TimeSpan::new(start, end).expect("test spans are not empty")
}

pub fn substrate(threads: usize, partitions: usize) -> RayonSubstrate {
    let config = Config::new(threads, partitions).expect("valid test config");
    RayonSubstrate::new(&config).expect("worker pool should start")
}

pub fn deltas<V: Clone + Send + Sync + 'static>(
    substrate: &RayonSubstrate,
    raw: &[(u64, &str, V)],
) -> PartitionedCollection<Delta<String, V>> {
    substrate.from_vec(
        raw.iter()
            .map(|(timestamp, key, value)| Delta::new(*timestamp, (*key).to_string(), value.clone()))
            .collect(),
    )
}

pub fn entries<V: Clone>(raw: &[(&str, V)]) -> Vec<(String, V)> {
    raw.iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

pub fn as_map<K: Ord, V>(entries: impl IntoIterator<Item = (K, V)>) -> BTreeMap<K, V> {
    entries.into_iter().collect()
}
