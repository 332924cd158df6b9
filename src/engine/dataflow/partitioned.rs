// Copyright © 2024 Pathway

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use rayon::iter::{
    IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator,
};
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::config::{Config, Error};
use super::shard::Shard;
use super::{Data, ExchangeKey, Substrate};

/// An immutable collection split into partitions. Cloning is cheap.
#[derive(Clone)]
pub struct PartitionedCollection<T> {
    partitions: Arc<Vec<Vec<T>>>,
}

impl<T> PartitionedCollection<T> {
    fn new(partitions: Vec<Vec<T>>) -> Self {
        Self {
            partitions: Arc::new(partitions),
        }
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flatten()
    }
}

impl<T: fmt::Debug> fmt::Debug for PartitionedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Runs collection operations on a dedicated rayon pool, one task per
/// partition. Keyed operations exchange data so that each key lives in
/// exactly one partition before it is processed.
#[derive(Clone, Debug)]
pub struct RayonSubstrate {
    pool: Arc<ThreadPool>,
    partitions: usize,
}

impl RayonSubstrate {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads())
            .thread_name(|index| format!("batchstore:worker-{index}"))
            .build()?;
        debug!(
            "Started a worker pool with {} threads and {} partitions",
            config.threads(),
            config.partitions()
        );
        Ok(Self {
            pool: Arc::new(pool),
            partitions: config.partitions(),
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Routes every pair to the partition owning its key. Within a target
    /// partition, pairs keep the order of their source partitions.
    fn exchange<K: ExchangeKey, V: Data>(&self, sources: Vec<Vec<(K, V)>>) -> Vec<Vec<(K, V)>> {
        let partitions = self.partitions;
        let buckets: Vec<Vec<Vec<(K, V)>>> = self.pool.install(|| {
            sources
                .into_par_iter()
                .map(|source| {
                    let mut buckets: Vec<Vec<(K, V)>> =
                        (0..partitions).map(|_| Vec::new()).collect();
                    for (key, value) in source {
                        buckets[key.partition_index(partitions)].push((key, value));
                    }
                    buckets
                })
                .collect()
        });

        let mut targets: Vec<Vec<(K, V)>> = (0..partitions).map(|_| Vec::new()).collect();
        for source_buckets in buckets {
            for (target, bucket) in targets.iter_mut().zip(source_buckets) {
                target.extend(bucket);
            }
        }
        targets
    }

    fn cloned_partitions<T: Data>(collection: &PartitionedCollection<T>) -> Vec<Vec<T>> {
        collection.partitions.as_ref().clone()
    }
}

fn combine_locally<K, V, F>(pairs: impl IntoIterator<Item = (K, V)>, logic: &F) -> Vec<(K, V)>
where
    K: ExchangeKey,
    F: Fn(V, V) -> V,
{
    let mut combined: IndexMap<K, Option<V>> = IndexMap::new();
    for (key, value) in pairs {
        let slot = combined.entry(key).or_insert(None);
        *slot = Some(match slot.take() {
            Some(previous) => logic(previous, value),
            None => value,
        });
    }
    combined
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
}

impl Substrate for RayonSubstrate {
    type Collection<T: Data> = PartitionedCollection<T>;

    fn from_vec<T: Data>(&self, items: Vec<T>) -> PartitionedCollection<T> {
        let chunk_len = items.len().div_ceil(self.partitions).max(1);
        let mut partitions: Vec<Vec<T>> = (0..self.partitions).map(|_| Vec::new()).collect();
        for (index, item) in items.into_iter().enumerate() {
            partitions[index / chunk_len].push(item);
        }
        PartitionedCollection::new(partitions)
    }

    fn to_vec<T: Data>(&self, collection: &PartitionedCollection<T>) -> Vec<T> {
        collection.iter().cloned().collect()
    }

    fn count<T: Data>(&self, collection: &PartitionedCollection<T>) -> usize {
        collection.partitions.iter().map(Vec::len).sum()
    }

    fn try_flat_map<T, U, I, E, F>(
        &self,
        collection: &PartitionedCollection<T>,
        logic: F,
    ) -> Result<PartitionedCollection<U>, E>
    where
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        E: Send,
        F: Fn(&T) -> Result<I, E> + Send + Sync,
    {
        let partitions = self.pool.install(|| {
            collection
                .partitions
                .par_iter()
                .map(|partition| -> Result<Vec<U>, E> {
                    let mut output = Vec::with_capacity(partition.len());
                    for item in partition {
                        output.extend(logic(item)?);
                    }
                    Ok(output)
                })
                .collect::<Result<Vec<Vec<U>>, E>>()
        })?;
        Ok(PartitionedCollection::new(partitions))
    }

    fn reduce_by_key<K, V, F>(
        &self,
        collection: &PartitionedCollection<(K, V)>,
        logic: F,
    ) -> PartitionedCollection<(K, V)>
    where
        K: ExchangeKey,
        V: Data,
        F: Fn(V, V) -> V + Send + Sync,
    {
        let precombined: Vec<Vec<(K, V)>> = self.pool.install(|| {
            collection
                .partitions
                .par_iter()
                .map(|partition| combine_locally(partition.iter().cloned(), &logic))
                .collect()
        });
        let exchanged = self.exchange(precombined);
        let partitions = self.pool.install(|| {
            exchanged
                .into_par_iter()
                .map(|partition| combine_locally(partition, &logic))
                .collect()
        });
        PartitionedCollection::new(partitions)
    }

    fn group_by_key_sorted<K, V, O, F>(
        &self,
        collection: &PartitionedCollection<(K, V)>,
        sort_key: F,
    ) -> PartitionedCollection<(K, Vec<V>)>
    where
        K: ExchangeKey,
        V: Data,
        O: Ord,
        F: Fn(&V) -> O + Send + Sync,
    {
        let exchanged = self.exchange(Self::cloned_partitions(collection));
        let partitions = self.pool.install(|| {
            exchanged
                .into_par_iter()
                .map(|partition| {
                    let mut groups: IndexMap<K, Vec<V>> = IndexMap::new();
                    for (key, value) in partition {
                        groups.entry(key).or_default().push(value);
                    }
                    groups
                        .into_iter()
                        .map(|(key, mut values)| {
                            // stable: equal sort keys keep their arrival order
                            values.sort_by_key(|value| sort_key(value));
                            (key, values)
                        })
                        .collect()
                })
                .collect()
        });
        PartitionedCollection::new(partitions)
    }

    fn cogroup<K, V, W>(
        &self,
        left: &PartitionedCollection<(K, V)>,
        right: &PartitionedCollection<(K, W)>,
    ) -> PartitionedCollection<(K, (Vec<V>, Vec<W>))>
    where
        K: ExchangeKey,
        V: Data,
        W: Data,
    {
        let left = self.exchange(Self::cloned_partitions(left));
        let right = self.exchange(Self::cloned_partitions(right));
        let partitions = self.pool.install(|| {
            left.into_par_iter()
                .zip(right.into_par_iter())
                .map(|(left, right)| {
                    let mut groups: IndexMap<K, (Vec<V>, Vec<W>)> = IndexMap::new();
                    for (key, value) in left {
                        groups.entry(key).or_default().0.push(value);
                    }
                    for (key, value) in right {
                        groups.entry(key).or_default().1.push(value);
                    }
                    groups.into_iter().collect()
                })
                .collect()
        });
        PartitionedCollection::new(partitions)
    }
}
