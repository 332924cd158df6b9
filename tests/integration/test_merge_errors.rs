// Copyright © 2024 Pathway

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;

use batchstore_engine::engine::merge::updated_value;
use batchstore_engine::engine::{
    combine_deltas, join_snapshot, Commutativity, Concat, Delta, Error, First, MergeEngine,
    Substrate, Sum, Timestamp,
};
use batchstore_engine::persistence::{Error as PersistenceError, MemorySnapshotStore};

use super::helpers::{deltas, entries, span, substrate};

#[test]
fn test_delta_outside_of_span() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::<String, i64>::new());
    let engine = MergeEngine::new(substrate(2, 2), store.clone());
    let deltas = deltas(engine.substrate(), &[(5, "a", 1_i64), (10, "b", 1)]);

    for commutativity in [Commutativity::Commutative, Commutativity::NonCommutative] {
        let result = engine.merge(span(0, 10), &deltas, commutativity, &Sum);
        assert_matches!(
            result,
            Err(Error::TimestampOutOfSpan { timestamp: Timestamp(10), .. })
        );
    }
    assert!(store.versions().is_empty());
    Ok(())
}

#[test]
fn test_duplicate_key_in_snapshot() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::with_initial(
        Timestamp(0),
        entries(&[("dup", 1_i64), ("other", 2), ("dup", 3)]),
    ));
    let engine = MergeEngine::new(substrate(2, 3), store);
    let deltas = deltas(engine.substrate(), &[(1, "other", 1_i64)]);

    let result = engine.merge(span(0, 10), &deltas, Commutativity::Commutative, &Sum);
    assert_matches!(result, Err(Error::DuplicateKey(key)) if key.contains("dup"));
    Ok(())
}

#[test]
fn test_too_many_deltas_for_non_commutative_key() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::<String, String>::new());
    let engine = MergeEngine::new(substrate(1, 1), store).with_max_deltas_per_key(Some(2));
    let deltas = deltas(
        engine.substrate(),
        &[
            (1, "busy", "a".to_string()),
            (2, "busy", "b".to_string()),
            (3, "busy", "c".to_string()),
            (1, "quiet", "d".to_string()),
        ],
    );

    let result = engine.merge(span(0, 10), &deltas, Commutativity::NonCommutative, &Concat);
    assert_matches!(
        result,
        Err(Error::TooManyDeltas { count: 3, limit: 2, ref key }) if key.contains("busy")
    );

    // commutative merges never hold a key's deltas together
    let result = engine.merge(span(0, 10), &deltas, Commutativity::Commutative, &Concat);
    assert!(result.is_ok());

    let unbounded = MergeEngine::new(
        engine.substrate().clone(),
        Arc::new(MemorySnapshotStore::<String, String>::new()),
    )
    .with_max_deltas_per_key(None);
    assert!(unbounded
        .merge(span(0, 10), &deltas, Commutativity::NonCommutative, &Concat)
        .is_ok());
    Ok(())
}

#[derive(Debug)]
struct CountedClone {
    clones: Arc<AtomicUsize>,
}

impl Clone for CountedClone {
    fn clone(&self) -> Self {
        self.clones.fetch_add(1, Ordering::SeqCst);
        Self {
            clones: self.clones.clone(),
        }
    }
}

#[test]
fn test_delta_limit_is_checked_before_grouping() -> eyre::Result<()> {
    let substrate = substrate(2, 4);
    let clones = Arc::new(AtomicUsize::new(0));
    let raw: Vec<Delta<String, CountedClone>> = (0..10_000_u64)
        .map(|time| {
            Delta::new(
                time,
                "busy".to_string(),
                CountedClone {
                    clones: clones.clone(),
                },
            )
        })
        .collect();
    let deltas = substrate.from_vec(raw);

    let result = combine_deltas(
        &substrate,
        &span(0, 10_000),
        &deltas,
        Commutativity::NonCommutative,
        &First,
        Some(2),
    );
    assert_matches!(
        result,
        Err(Error::TooManyDeltas {
            count: 10_000,
            limit: 2,
            ..
        })
    );
    assert_eq!(clones.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_key_missing_on_both_sides() -> eyre::Result<()> {
    let result = updated_value(&"ghost", &(None::<i64>, None), &Sum);
    assert_matches!(
        result,
        Err(Error::InvariantViolation { ref key, .. }) if key.contains("ghost")
    );

    assert_eq!(updated_value(&"k", &(Some(1_i64), Some((Timestamp(1), 2))), &Sum)?, 3);
    assert_eq!(updated_value(&"k", &(None, Some((Timestamp(1), 2_i64))), &Sum)?, 2);
    assert_eq!(updated_value(&"k", &(Some(1_i64), None), &Sum)?, 1);
    Ok(())
}

#[test]
fn test_stored_value_comes_first() -> eyre::Result<()> {
    let joined = (Some("old".to_string()), Some((Timestamp(1), "new".to_string())));
    assert_eq!(updated_value(&"k", &joined, &Concat)?, "oldnew");
    Ok(())
}

#[test]
fn test_uncombined_deltas_are_an_invariant_violation() -> eyre::Result<()> {
    let substrate = substrate(1, 2);
    let combined = substrate.from_vec(vec![
        ("k".to_string(), (Timestamp(1), 1_i64)),
        ("k".to_string(), (Timestamp(2), 2_i64)),
    ]);
    let snapshot = substrate.from_vec(Vec::<(String, i64)>::new());
    assert_matches!(
        join_snapshot(&substrate, &combined, &snapshot),
        Err(Error::InvariantViolation { .. })
    );
    Ok(())
}

#[test]
fn test_rerunning_a_written_span_is_refused() -> eyre::Result<()> {
    let store = Arc::new(MemorySnapshotStore::with_initial(
        Timestamp(0),
        entries(&[("k", 1_i64)]),
    ));
    let engine = MergeEngine::new(substrate(1, 1), store.clone());
    let deltas = deltas(engine.substrate(), &[(1, "k", 1_i64)]);

    engine
        .merge(span(0, 10), &deltas, Commutativity::Commutative, &Sum)?
        .into_write_action()
        .run()?;
    let result = engine.merge(span(0, 10), &deltas, Commutativity::Commutative, &Sum);
    assert_matches!(
        result,
        Err(Error::Persistence(PersistenceError::SnapshotOverlapsSpan {
            as_of: Timestamp(10),
            ..
        }))
    );
    Ok(())
}
