// Copyright © 2024 Pathway

use std::io::{self, ErrorKind};
use std::sync::Arc;

use assert_matches::assert_matches;

use batchstore_engine::connectors::{MemorySink, MemorySource, Sink, Source};
use batchstore_engine::engine::error::DynResult;
use batchstore_engine::engine::{
    merge_window, Commutativity, Concat, Error, MergeEngine, PreMergeRecord, Sum, TimeSpan,
    Timestamp, WindowStats,
};
use batchstore_engine::persistence::MemorySnapshotStore;

use super::helpers::{as_map, entries, span, substrate};

fn source<V>(raw: &[(u64, &str, V)]) -> MemorySource<(String, V)>
where
    V: Clone,
{
    raw.iter()
        .map(|(timestamp, key, value)| (Timestamp(*timestamp), ((*key).to_string(), value.clone())))
        .collect()
}

struct FailingSink;

impl Sink<PreMergeRecord<String, i64>> for FailingSink {
    fn write(
        &self,
        _span: &TimeSpan,
        _entries: Vec<(Timestamp, PreMergeRecord<String, i64>)>,
    ) -> DynResult<()> {
        Err(Box::new(io::Error::new(
            ErrorKind::ConnectionRefused,
            "downstream is unavailable",
        )))
    }
}

#[test]
fn test_source_reads_only_its_span() -> eyre::Result<()> {
    let mut source = source(&[(1, "a", 1_i64), (10, "b", 2)]);
    source.push(19_u64, ("c".to_string(), 3));
    source.push(20_u64, ("d".to_string(), 4));

    let read = source.read(&span(10, 20)).map_err(|e| eyre::eyre!(e))?;
    assert_eq!(
        read,
        vec![
            (Timestamp(10), ("b".to_string(), 2)),
            (Timestamp(19), ("c".to_string(), 3)),
        ]
    );
    assert_eq!(source.name(), "MemorySource");
    Ok(())
}

#[test]
fn test_consecutive_windows() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::<String, i64>::new());
    let engine = MergeEngine::new(substrate(2, 3), store.clone());
    let source = source(&[
        (1, "a", 1_i64),
        (5, "b", 2),
        (7, "a", 3),
        (12, "a", 10),
        (15, "c", 1),
    ]);
    let sink = MemorySink::new();

    let first = merge_window(
        &engine,
        span(0, 10),
        &source,
        &sink,
        Commutativity::Commutative,
        &Sum,
    )?;
    assert_eq!(
        first,
        WindowStats {
            deltas: 3,
            changed_keys: 2,
        }
    );
    let second = merge_window(
        &engine,
        span(10, 20),
        &source,
        &sink,
        Commutativity::Commutative,
        &Sum,
    )?;
    assert_eq!(second.deltas, 2);
    assert_eq!(second.changed_keys, 2);

    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].0, span(0, 10));
    assert_eq!(batches[1].0, span(10, 20));

    let second_batch = as_map(
        batches[1]
            .1
            .iter()
            .map(|(timestamp, (key, record))| (key.clone(), (*timestamp, *record))),
    );
    assert_eq!(second_batch["a"], (Timestamp(12), (Some(4), 10)));
    assert_eq!(second_batch["c"], (Timestamp(15), (None, 1)));

    assert_eq!(store.versions(), vec![Timestamp(10), Timestamp(20)]);
    assert_eq!(
        as_map(store.latest().expect("snapshot was written").1),
        as_map(entries(&[("a", 14), ("b", 2), ("c", 1)]))
    );
    Ok(())
}

#[test]
fn test_quiet_window_still_advances_snapshot() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::with_initial(
        Timestamp(0),
        entries(&[("a", "x".to_string())]),
    ));
    let engine = MergeEngine::new(substrate(1, 1), store.clone());
    let sink = MemorySink::new();

    let stats = merge_window(
        &engine,
        span(0, 10),
        &source::<String>(&[]),
        &sink,
        Commutativity::NonCommutative,
        &Concat,
    )?;
    assert_eq!(stats, WindowStats::default());
    assert_eq!(sink.entries(), Vec::new());
    assert_eq!(
        store.latest(),
        Some((Timestamp(10), entries(&[("a", "x".to_string())])))
    );
    Ok(())
}

#[test]
fn test_failed_sink_keeps_previous_snapshot() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::with_initial(
        Timestamp(0),
        entries(&[("a", 1_i64)]),
    ));
    let engine = MergeEngine::new(substrate(2, 2), store.clone());
    let source = source(&[(1, "a", 5_i64)]);

    let result = merge_window(
        &engine,
        span(0, 10),
        &source,
        &FailingSink,
        Commutativity::Commutative,
        &Sum,
    );
    assert_matches!(result, Err(Error::Other(_)));
    assert_matches!(
        result.map_err(Error::downcast::<io::Error>),
        Err(Ok(inner)) if inner.kind() == ErrorKind::ConnectionRefused
    );
    assert_eq!(store.versions(), vec![Timestamp(0)]);

    let sink = MemorySink::new();
    merge_window(
        &engine,
        span(0, 10),
        &source,
        &sink,
        Commutativity::Commutative,
        &Sum,
    )?;
    assert_eq!(
        store.latest(),
        Some((Timestamp(10), entries(&[("a", 6)])))
    );
    Ok(())
}
