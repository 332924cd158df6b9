// Copyright © 2024 Pathway

use std::hash::{Hash, Hasher as _};

use xxhash_rust::xxh3::Xxh3 as Hasher;

/// Decides which partition owns a key. Every keyed exchange uses the same
/// function, so two collections exchanged with the same partition count
/// end up aligned.
pub trait Shard {
    fn shard(&self) -> u64;

    #[allow(clippy::cast_possible_truncation)]
    fn shard_as_usize(&self) -> usize {
        self.shard() as usize
    }

    fn partition_index(&self, partitions: usize) -> usize {
        self.shard_as_usize() % partitions.max(1)
    }
}

impl<T: Hash + ?Sized> Shard for T {
    fn shard(&self) -> u64 {
        let mut hasher = Hasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
