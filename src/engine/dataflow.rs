// Copyright © 2024 Pathway

//! The bulk-data interface the merge engine is written against.
//!
//! A [`Substrate`] owns the execution resources and knows how to run the
//! handful of partition-parallel primitives the engine needs. Collections
//! are immutable handles: operations read their inputs and produce new
//! collections, never modifying what they were given.

pub mod config;
pub mod partitioned;
pub mod shard;

use std::convert::Infallible;
use std::fmt::Debug;
use std::hash::Hash;

pub use self::config::Config;
pub use self::partitioned::{PartitionedCollection, RayonSubstrate};
pub use self::shard::Shard;

/// Anything that can be stored in a collection and moved between workers.
pub trait Data: Clone + Send + Sync + 'static {}
impl<T> Data for T where T: Clone + Send + Sync + 'static {}

/// Anything a collection can be keyed by.
pub trait ExchangeKey: Data + Eq + Hash + Debug {}
impl<T> ExchangeKey for T where T: Data + Eq + Hash + Debug {}

pub trait Substrate: Clone + Send + Sync + 'static {
    type Collection<T: Data>: Clone + Send + Sync;

    fn from_vec<T: Data>(&self, items: Vec<T>) -> Self::Collection<T>;

    fn to_vec<T: Data>(&self, collection: &Self::Collection<T>) -> Vec<T>;

    fn count<T: Data>(&self, collection: &Self::Collection<T>) -> usize;

    /// Applies `logic` to every element independently. The first error
    /// encountered by any worker aborts the whole operation.
    fn try_flat_map<T, U, I, E, F>(
        &self,
        collection: &Self::Collection<T>,
        logic: F,
    ) -> Result<Self::Collection<U>, E>
    where
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        E: Send,
        F: Fn(&T) -> Result<I, E> + Send + Sync;

    /// Combines all values sharing a key with `logic`. No order is
    /// guaranteed between the values being combined.
    fn reduce_by_key<K, V, F>(
        &self,
        collection: &Self::Collection<(K, V)>,
        logic: F,
    ) -> Self::Collection<(K, V)>
    where
        K: ExchangeKey,
        V: Data,
        F: Fn(V, V) -> V + Send + Sync;

    /// Brings all values of a key together and sorts them by `sort_key`.
    /// Every produced group is non-empty.
    fn group_by_key_sorted<K, V, O, F>(
        &self,
        collection: &Self::Collection<(K, V)>,
        sort_key: F,
    ) -> Self::Collection<(K, Vec<V>)>
    where
        K: ExchangeKey,
        V: Data,
        O: Ord,
        F: Fn(&V) -> O + Send + Sync;

    /// Pairs, per key, the values found in `left` with the values found in
    /// `right`. Only keys present on at least one side are produced.
    fn cogroup<K, V, W>(
        &self,
        left: &Self::Collection<(K, V)>,
        right: &Self::Collection<(K, W)>,
    ) -> Self::Collection<(K, (Vec<V>, Vec<W>))>
    where
        K: ExchangeKey,
        V: Data,
        W: Data;

    fn try_map<T, U, E, F>(
        &self,
        collection: &Self::Collection<T>,
        logic: F,
    ) -> Result<Self::Collection<U>, E>
    where
        T: Data,
        U: Data,
        E: Send,
        F: Fn(&T) -> Result<U, E> + Send + Sync,
    {
        self.try_flat_map(collection, |item| logic(item).map(Some))
    }

    fn map<T, U, F>(&self, collection: &Self::Collection<T>, logic: F) -> Self::Collection<U>
    where
        T: Data,
        U: Data,
        F: Fn(&T) -> U + Send + Sync,
    {
        match self.try_flat_map(collection, |item| Ok::<_, Infallible>(Some(logic(item)))) {
            Ok(mapped) => mapped,
            Err(never) => match never {},
        }
    }

    fn filter_map<T, U, F>(&self, collection: &Self::Collection<T>, logic: F) -> Self::Collection<U>
    where
        T: Data,
        U: Data,
        F: Fn(&T) -> Option<U> + Send + Sync,
    {
        match self.try_flat_map(collection, |item| Ok::<_, Infallible>(logic(item))) {
            Ok(filtered) => filtered,
            Err(never) => match never {},
        }
    }
}
