// Copyright © 2024 Pathway

use log::{info, warn};

use super::dataflow::{Data, ExchangeKey, Substrate};
use super::merge::{Delta, MergeEngine};
use super::{Commutativity, Error, Result, Semigroup, TimeSpan};
use crate::connectors::{Sink, Source};
use crate::persistence::SnapshotStore;

/// A pre-merge record as handed to a sink: the key with its stored value
/// and combined delta.
pub type PreMergeRecord<K, V> = (K, (Option<V>, V));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub deltas: usize,
    pub changed_keys: usize,
}

/// Runs one window end to end: reads the span's deltas from `source`,
/// merges them, delivers the pre-merge stream to `sink` and only after the
/// sink accepted it persists the updated snapshot. If anything before the
/// write fails, the store keeps its previous snapshot.
pub fn merge_window<S, St, K, V, G>(
    engine: &MergeEngine<S, St>,
    span: TimeSpan,
    source: &impl Source<(K, V)>,
    sink: &impl Sink<PreMergeRecord<K, V>>,
    commutativity: Commutativity,
    semigroup: &G,
) -> Result<WindowStats>
where
    S: Substrate,
    St: SnapshotStore<K, V>,
    K: ExchangeKey,
    V: Data,
    G: Semigroup<V>,
{
    let events = source.read(&span).map_err(Error::from)?;
    if events.is_empty() {
        warn!(
            "Source {} produced no deltas for time span {span}",
            source.name()
        );
    }
    let stats_deltas = events.len();
    let substrate = engine.substrate();
    let deltas = substrate.from_vec(events.into_iter().map(Delta::from).collect());

    let (pre_merge, write) = engine
        .merge(span, &deltas, commutativity, semigroup)?
        .into_parts();
    let records: Vec<_> = substrate
        .to_vec(&pre_merge)
        .into_iter()
        .map(|entry| entry.into_timed())
        .collect();
    let stats = WindowStats {
        deltas: stats_deltas,
        changed_keys: records.len(),
    };

    sink.write(&span, records).map_err(Error::from)?;
    write.run()?;
    info!(
        "Merged time span {span}: {} deltas changed {} keys, written to {}",
        stats.deltas,
        stats.changed_keys,
        sink.name()
    );
    Ok(stats)
}
