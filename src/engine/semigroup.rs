// Copyright © 2024 Pathway

use std::cmp::{max, min};
use std::fmt;
use std::ops::Add;

/// An associative combine operation over `V`.
///
/// Semigroups are passed to the merge engine explicitly. They are shared
/// between worker threads, hence the `Send + Sync` bound. Nothing here
/// assumes commutativity: `plus(a, b)` always means "`a` happened before
/// `b`".
pub trait Semigroup<V>: Send + Sync {
    fn plus(&self, lhs: V, rhs: V) -> V;

    /// Folds `values` left to right. Returns `None` only for an empty input.
    fn sum_option<I>(&self, values: I) -> Option<V>
    where
        I: IntoIterator<Item = V>,
        Self: Sized,
    {
        values.into_iter().reduce(|acc, value| self.plus(acc, value))
    }
}

impl<V, G: Semigroup<V>> Semigroup<V> for &G {
    fn plus(&self, lhs: V, rhs: V) -> V {
        (**self).plus(lhs, rhs)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<V: Add<Output = V>> Semigroup<V> for Sum {
    fn plus(&self, lhs: V, rhs: V) -> V {
        lhs + rhs
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl<V: Ord> Semigroup<V> for Max {
    fn plus(&self, lhs: V, rhs: V) -> V {
        max(lhs, rhs)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl<V: Ord> Semigroup<V> for Min {
    fn plus(&self, lhs: V, rhs: V) -> V {
        min(lhs, rhs)
    }
}

/// Keeps the earliest value.
#[derive(Debug, Clone, Copy, Default)]
pub struct First;

impl<V> Semigroup<V> for First {
    fn plus(&self, lhs: V, _rhs: V) -> V {
        lhs
    }
}

/// Keeps the latest value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Last;

impl<V> Semigroup<V> for Last {
    fn plus(&self, _lhs: V, rhs: V) -> V {
        rhs
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Concat;

impl Semigroup<String> for Concat {
    fn plus(&self, mut lhs: String, rhs: String) -> String {
        lhs.push_str(&rhs);
        lhs
    }
}

impl<T> Semigroup<Vec<T>> for Concat {
    fn plus(&self, mut lhs: Vec<T>, rhs: Vec<T>) -> Vec<T> {
        lhs.extend(rhs);
        lhs
    }
}

impl<V1, V2, A, B> Semigroup<(V1, V2)> for (A, B)
where
    A: Semigroup<V1>,
    B: Semigroup<V2>,
{
    fn plus(&self, lhs: (V1, V2), rhs: (V1, V2)) -> (V1, V2) {
        (self.0.plus(lhs.0, rhs.0), self.1.plus(lhs.1, rhs.1))
    }
}

/// Turns an associative closure into a semigroup.
#[derive(Clone, Copy)]
pub struct FnSemigroup<F>(F);

impl<F> fmt::Debug for FnSemigroup<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSemigroup")
    }
}

impl<V, F> Semigroup<V> for FnSemigroup<F>
where
    F: Fn(V, V) -> V + Send + Sync,
{
    fn plus(&self, lhs: V, rhs: V) -> V {
        (self.0)(lhs, rhs)
    }
}

pub fn semigroup_fn<V, F>(logic: F) -> FnSemigroup<F>
where
    F: Fn(V, V) -> V + Send + Sync,
{
    FnSemigroup(logic)
}
