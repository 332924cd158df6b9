// Copyright © 2024 Pathway

use std::sync::Mutex;

use crate::engine::error::DynResult;
use crate::engine::{TimeSpan, Timestamp};

use super::{Sink, Source};

/// Serves a fixed list of events, restricted to the requested span.
#[derive(Debug, Clone)]
pub struct MemorySource<T> {
    events: Vec<(Timestamp, T)>,
}

impl<T> MemorySource<T> {
    pub fn new(events: Vec<(Timestamp, T)>) -> Self {
        Self { events }
    }

    pub fn push(&mut self, timestamp: impl Into<Timestamp>, value: T) {
        self.events.push((timestamp.into(), value));
    }
}

impl<T> FromIterator<(Timestamp, T)> for MemorySource<T> {
    fn from_iter<I: IntoIterator<Item = (Timestamp, T)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Clone + Send + Sync> Source<T> for MemorySource<T> {
    fn read(&self, span: &TimeSpan) -> DynResult<Vec<(Timestamp, T)>> {
        Ok(self
            .events
            .iter()
            .filter(|(timestamp, _)| span.contains(*timestamp))
            .cloned()
            .collect())
    }
}

/// Remembers every batch written to it, in order.
#[derive(Debug)]
pub struct MemorySink<T> {
    batches: Mutex<Vec<(TimeSpan, Vec<(Timestamp, T)>)>>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> MemorySink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(TimeSpan, Vec<(Timestamp, T)>)> {
        self.batches.lock().unwrap().clone()
    }

    /// All entries written so far, regardless of their span.
    pub fn entries(&self) -> Vec<(Timestamp, T)> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, entries)| entries.iter().cloned())
            .collect()
    }
}

impl<T: Send> Sink<T> for MemorySink<T> {
    fn write(&self, span: &TimeSpan, entries: Vec<(Timestamp, T)>) -> DynResult<()> {
        self.batches.lock().unwrap().push((*span, entries));
        Ok(())
    }
}
