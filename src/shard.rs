use foldhash::fast::RandomState;
use std::cell::UnsafeCell;
use std::collections::HashMap;

/// The storage type of a single shard.
pub type ShardTable<K, V> = HashMap<K, V, RandomState>;

/// One independently lockable partition of the key space.
///
/// A shard does not own its lock: depending on the strategy the guarding
/// mutex lives in a pool and may be shared with other shards, or even change
/// from one access to the next. Access to the table is therefore `unsafe` and
/// only sound while the caller holds a [`Lease`](crate::Lease) for this shard.
pub struct Shard<K, V> {
    table: UnsafeCell<ShardTable<K, V>>,
}

// Safety: the table is only reached through `table`/`table_mut`, whose callers
// hold the lock guarding this shard. That lock hands the table from thread to
// thread the way `Mutex<T>` does, hence the same `T: Send` bound.
unsafe impl<K: Send, V: Send> Sync for Shard<K, V> {}

impl<K, V> Shard<K, V> {
    /// Creates an empty shard with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: UnsafeCell::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::default(),
            )),
        }
    }

    /// # Safety
    /// The caller must hold the lease guarding this shard for all of `'a`.
    pub(crate) unsafe fn table<'a>(&'a self) -> &'a ShardTable<K, V> {
        &*self.table.get()
    }

    /// # Safety
    /// The caller must hold the lease guarding this shard for all of `'a`, and
    /// no other reference into the table may be alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn table_mut<'a>(&'a self) -> &'a mut ShardTable<K, V> {
        &mut *self.table.get()
    }
}

/// Builds the fixed shard array of a map. It is never resized afterwards.
pub(crate) fn build_shards<K, V>(shard_count: usize, shard_capacity: usize) -> Box<[Shard<K, V>]> {
    (0..shard_count)
        .map(|_| Shard::with_capacity(shard_capacity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_shards() {
        let shards = build_shards::<u32, u32>(5, 16);
        assert_eq!(shards.len(), 5);
        // Single-threaded test: nothing else can touch the tables.
        for shard in shards.iter() {
            let table = unsafe { shard.table() };
            assert!(table.is_empty());
            assert!(table.capacity() >= 16);
        }
    }

    #[test]
    fn test_table_mut() {
        let shard = Shard::<String, u32>::with_capacity(0);
        unsafe {
            shard.table_mut().insert("hello".into(), 1);
            *shard.table_mut().get_mut("hello").unwrap() += 1;
            assert_eq!(shard.table().get("hello"), Some(&2));
        }
    }
}
