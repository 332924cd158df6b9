// Copyright © 2024 Pathway

use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dataflow::config::DEFAULT_MAX_DELTAS_PER_KEY;
use super::dataflow::{Config, Data, ExchangeKey, RayonSubstrate, Substrate};
use super::{Commutativity, Error, Result, Semigroup, TimeSpan, Timestamp};
use crate::persistence::SnapshotStore;

/// A value observed for a key at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delta<K, V> {
    pub timestamp: Timestamp,
    pub key: K,
    pub value: V,
}

impl<K, V> Delta<K, V> {
    pub fn new(timestamp: impl Into<Timestamp>, key: K, value: V) -> Self {
        Self {
            timestamp: timestamp.into(),
            key,
            value,
        }
    }
}

impl<K, V> From<(Timestamp, (K, V))> for Delta<K, V> {
    fn from((timestamp, (key, value)): (Timestamp, (K, V))) -> Self {
        Self {
            timestamp,
            key,
            value,
        }
    }
}

/// The state of a key right before a merge, next to what the merge adds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreMergeEntry<K, V> {
    /// The latest timestamp among the key's deltas.
    pub timestamp: Timestamp,
    pub key: K,
    /// The value stored in the snapshot, `None` for keys seen first.
    pub stored: Option<V>,
    /// All of the key's deltas, combined.
    pub delta: V,
}

impl<K, V> PreMergeEntry<K, V> {
    pub fn into_timed(self) -> (Timestamp, (K, (Option<V>, V))) {
        (self.timestamp, (self.key, (self.stored, self.delta)))
    }
}

/// Per key: the stored value and the combined delta with its timestamp.
pub type Joined<V> = (Option<V>, Option<(Timestamp, V)>);

/// Combines the deltas of every key into a single `(max timestamp, value)`.
///
/// Commutative deltas are reduced in whatever order the substrate finds
/// convenient. Non-commutative ones are grouped per key and folded in
/// ascending timestamp order, which requires each key's deltas to fit in
/// memory at once; `max_deltas_per_key` bounds that, and is checked
/// before any key's deltas are grouped.
pub fn combine_deltas<S, K, V, G>(
    substrate: &S,
    span: &TimeSpan,
    deltas: &S::Collection<Delta<K, V>>,
    commutativity: Commutativity,
    semigroup: &G,
    max_deltas_per_key: Option<usize>,
) -> Result<S::Collection<(K, (Timestamp, V))>>
where
    S: Substrate,
    K: ExchangeKey,
    V: Data,
    G: Semigroup<V>,
{
    match commutativity {
        Commutativity::Commutative => {
            let keyed = substrate.try_map(deltas, |delta| -> Result<_> {
                check_in_span(span, delta)?;
                Ok((delta.key.clone(), (delta.timestamp, delta.value.clone())))
            })?;
            Ok(substrate.reduce_by_key(
                &keyed,
                |(lhs_time, lhs), (rhs_time, rhs)| (lhs_time.max(rhs_time), semigroup.plus(lhs, rhs)),
            ))
        }
        Commutativity::NonCommutative => {
            let counts = substrate.try_map(deltas, |delta| -> Result<_> {
                check_in_span(span, delta)?;
                Ok((delta.key.clone(), 1_usize))
            })?;
            if let Some(limit) = max_deltas_per_key {
                check_delta_counts(substrate, &counts, limit)?;
            }

            let keyed = substrate.map(deltas, |delta| {
                (delta.key.clone(), (delta.timestamp, delta.value.clone()))
            });
            let grouped = substrate.group_by_key_sorted(&keyed, |(timestamp, _)| *timestamp);
            substrate.try_map(&grouped, |(key, values)| -> Result<_> {
                let (max_timestamp, _) = values
                    .last()
                    .ok_or_else(|| Error::EmptyFold(format!("{key:?}")))?;
                let combined = semigroup
                    .sum_option(values.iter().map(|(_, value)| value.clone()))
                    .ok_or_else(|| Error::EmptyFold(format!("{key:?}")))?;
                Ok((key.clone(), (*max_timestamp, combined)))
            })
        }
    }
}

fn check_in_span<K: fmt::Debug, V>(span: &TimeSpan, delta: &Delta<K, V>) -> Result<()> {
    if span.contains(delta.timestamp) {
        Ok(())
    } else {
        Err(Error::TimestampOutOfSpan {
            key: format!("{:?}", delta.key),
            timestamp: delta.timestamp,
            span: *span,
        })
    }
}

/// Counts are combined per partition before they are exchanged, so no key's
/// values are gathered in one place while the limit is checked.
fn check_delta_counts<S, K>(
    substrate: &S,
    counts: &S::Collection<(K, usize)>,
    limit: usize,
) -> Result<()>
where
    S: Substrate,
    K: ExchangeKey,
{
    let totals = substrate.reduce_by_key(counts, |lhs, rhs| lhs + rhs);
    substrate.try_flat_map(&totals, |(key, count)| {
        if *count > limit {
            return Err(Error::TooManyDeltas {
                key: format!("{key:?}"),
                count: *count,
                limit,
            });
        }
        Ok(None::<()>)
    })?;
    Ok(())
}

/// Co-groups combined deltas with the snapshot. Every key of either side
/// appears exactly once in the result.
pub fn join_snapshot<S, K, V>(
    substrate: &S,
    combined: &S::Collection<(K, (Timestamp, V))>,
    snapshot: &S::Collection<(K, V)>,
) -> Result<S::Collection<(K, Joined<V>)>>
where
    S: Substrate,
    K: ExchangeKey,
    V: Data,
{
    let cogrouped = substrate.cogroup(combined, snapshot);
    substrate.try_map(&cogrouped, |(key, (deltas, stored))| {
        if deltas.len() > 1 {
            return Err(Error::invariant_violation(
                key,
                "deltas were not combined into a single value",
            ));
        }
        if stored.len() > 1 {
            return Err(Error::DuplicateKey(format!("{key:?}")));
        }
        Ok((key.clone(), (stored.first().cloned(), deltas.first().cloned())))
    })
}

/// Folds the combined delta into the stored value, if any.
pub fn updated_value<K, V, G>(key: &K, joined: &Joined<V>, semigroup: &G) -> Result<V>
where
    K: fmt::Debug,
    V: Clone,
    G: Semigroup<V>,
{
    match joined {
        (Some(stored), Some((_, delta))) => Ok(semigroup.plus(stored.clone(), delta.clone())),
        (None, Some((_, delta))) => Ok(delta.clone()),
        (Some(stored), None) => Ok(stored.clone()),
        (None, None) => Err(Error::invariant_violation(
            key,
            "key is present neither in the snapshot nor in the deltas",
        )),
    }
}

/// Persists an already computed snapshot when run.
///
/// Running consumes the action, so a merge is written at most once, and
/// the written snapshot is exactly the one computed by the merge.
#[must_use = "the updated snapshot is only persisted when the action is run"]
pub struct WriteAction<S: Substrate, St, K: Data, V: Data> {
    substrate: S,
    store: Arc<St>,
    span: TimeSpan,
    updated: S::Collection<(K, V)>,
}

impl<S, St, K, V> WriteAction<S, St, K, V>
where
    S: Substrate,
    St: SnapshotStore<K, V>,
    K: Data,
    V: Data,
{
    pub fn span(&self) -> &TimeSpan {
        &self.span
    }

    pub fn run(self) -> Result<()> {
        let entries = self.substrate.to_vec(&self.updated);
        info!(
            "Writing snapshot with {} keys for time span {}",
            entries.len(),
            self.span
        );
        self.store.persist(&self.span, entries)?;
        Ok(())
    }
}

impl<S: Substrate, St, K: Data, V: Data> fmt::Debug for WriteAction<S, St, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteAction")
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

/// Output of a merge: what changed, plus the not yet executed write of the
/// new snapshot.
#[must_use]
pub struct MergeResult<S: Substrate, St, K: Data, V: Data> {
    pre_merge: S::Collection<PreMergeEntry<K, V>>,
    write: WriteAction<S, St, K, V>,
}

impl<S: Substrate, St, K: Data, V: Data> MergeResult<S, St, K, V> {
    /// One entry per key that received at least one delta.
    pub fn pre_merge(&self) -> &S::Collection<PreMergeEntry<K, V>> {
        &self.pre_merge
    }

    pub fn into_parts(
        self,
    ) -> (
        S::Collection<PreMergeEntry<K, V>>,
        WriteAction<S, St, K, V>,
    ) {
        (self.pre_merge, self.write)
    }

    pub fn into_write_action(self) -> WriteAction<S, St, K, V> {
        self.write
    }
}

impl<S: Substrate, St, K: Data, V: Data> fmt::Debug for MergeResult<S, St, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeResult")
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

/// Folds windows of deltas into the snapshots of one store.
///
/// The engine holds no state between calls. Concurrent merges on the same
/// store are not coordinated here: whoever runs the write actions has to
/// sequence them, one window after another.
pub struct MergeEngine<S, St> {
    substrate: S,
    store: Arc<St>,
    max_deltas_per_key: Option<usize>,
}

impl<St> MergeEngine<RayonSubstrate, St> {
    pub fn from_config(config: &Config, store: Arc<St>) -> Result<Self> {
        let substrate = RayonSubstrate::new(config)?;
        Ok(Self::new(substrate, store).with_max_deltas_per_key(config.max_deltas_per_key()))
    }
}

impl<S: Substrate, St> MergeEngine<S, St> {
    pub fn new(substrate: S, store: Arc<St>) -> Self {
        Self {
            substrate,
            store,
            max_deltas_per_key: Some(DEFAULT_MAX_DELTAS_PER_KEY),
        }
    }

    #[must_use]
    pub fn with_max_deltas_per_key(mut self, limit: Option<usize>) -> Self {
        self.max_deltas_per_key = limit;
        self
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Folds `deltas`, which must all lie within `span`, into the store's
    /// snapshot for `span`. Nothing is persisted until the returned write
    /// action is run.
    pub fn merge<K, V, G>(
        &self,
        span: TimeSpan,
        deltas: &S::Collection<Delta<K, V>>,
        commutativity: Commutativity,
        semigroup: &G,
    ) -> Result<MergeResult<S, St, K, V>>
    where
        K: ExchangeKey,
        V: Data,
        G: Semigroup<V>,
        St: SnapshotStore<K, V>,
    {
        let substrate = &self.substrate;
        let snapshot = substrate.from_vec(self.store.snapshot(&span)?);
        debug!(
            "Merging {} deltas into a snapshot of {} keys for time span {span} ({commutativity})",
            substrate.count(deltas),
            substrate.count(&snapshot)
        );

        let combined = combine_deltas(
            substrate,
            &span,
            deltas,
            commutativity,
            semigroup,
            self.max_deltas_per_key,
        )?;
        let joined = join_snapshot(substrate, &combined, &snapshot)?;

        let pre_merge = substrate.filter_map(&joined, |(key, (stored, delta))| {
            delta.as_ref().map(|(timestamp, delta)| PreMergeEntry {
                timestamp: *timestamp,
                key: key.clone(),
                stored: stored.clone(),
                delta: delta.clone(),
            })
        });
        let updated = substrate.try_map(&joined, |(key, joined)| -> Result<(K, V)> {
            Ok((key.clone(), updated_value(key, joined, semigroup)?))
        })?;
        debug!(
            "Merge for time span {span} changed {} keys",
            substrate.count(&pre_merge)
        );

        Ok(MergeResult {
            pre_merge,
            write: WriteAction {
                substrate: substrate.clone(),
                store: Arc::clone(&self.store),
                span,
                updated,
            },
        })
    }
}
