use crate::{
    build_shards, default_shard_count, AcquireEvent, AcquireObserver, Direct, DynamicPool, Error,
    Lease, LockStrategy, MapConfig, Presence, ReadAccess, Result, Shard, ShardRouter, StaticPool,
    TracingObserver, WriteAccess,
};
use foldhash::fast::RandomState;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A plain copy of a map's contents, as returned by [`ShardedMap::snapshot`].
pub type Snapshot<K, V> = HashMap<K, V, RandomState>;

/// A sharded map where every shard owns one mutex.
pub type DirectMap<K, V> = ShardedMap<K, V, Direct>;
/// A sharded map guarded by a fixed pool of mutexes, shard `i` by `i % mutex_count`.
pub type StaticPoolMap<K, V> = ShardedMap<K, V, StaticPool>;
/// A sharded map guarded by a pool of mutexes assigned per access.
pub type DynamicPoolMap<K, V> = ShardedMap<K, V, DynamicPool>;

/// A thread-safe hashmap split into shards, each guarded by a lock chosen by
/// the strategy `S`.
///
/// Accesses return scoped handles that keep the shard locked until they are
/// dropped. Keys in different shards proceed in parallel (for the pooled
/// strategies, as long as enough mutexes are free).
pub struct ShardedMap<K, V, S = Direct> {
    router: ShardRouter,
    shards: Box<[Shard<K, V>]>,
    strategy: S,
    observer: Box<dyn AcquireObserver>,
    diagnostics: bool,
}

impl<K: Eq + Hash, V> Default for ShardedMap<K, V, Direct> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> ShardedMap<K, V, Direct> {
    /// Creates a new map with the default number of shards and one mutex per
    /// shard.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new map with the specified initial capacity and the default
    /// number of shards.
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_count = default_shard_count();
        Self::from_parts(
            MapConfig::new(shard_count).capacity(capacity),
            Direct::new(shard_count),
        )
    }
}

impl<K: Eq + Hash, V, S: LockStrategy> ShardedMap<K, V, S> {
    /// Creates a map from a full configuration.
    ///
    /// # Errors
    /// [`Error::InvalidConfiguration`] if the counts are zero or do not suit
    /// the strategy.
    pub fn try_with_config(config: MapConfig) -> Result<Self> {
        let strategy = S::from_config(&config)?;
        Ok(Self::from_parts(config, strategy))
    }

    /// Creates a map with `shard_count` shards and a pool of `mutex_count`
    /// mutexes.
    ///
    /// # Examples
    /// ```
    /// use shardlock::{Error, StaticPoolMap};
    ///
    /// let map = StaticPoolMap::<u32, u32>::try_new(4, 3).unwrap();
    /// assert_eq!(map.mutex_count(), 3);
    ///
    /// let err = StaticPoolMap::<u32, u32>::try_new(0, 3).err();
    /// assert!(matches!(err, Some(Error::InvalidConfiguration(_))));
    /// ```
    pub fn try_new(shard_count: usize, mutex_count: usize) -> Result<Self> {
        Self::try_with_config(MapConfig::new(shard_count).mutex_count(mutex_count))
    }

    fn from_parts(config: MapConfig, strategy: S) -> Self {
        tracing::debug!(
            shard_count = config.shard_count,
            mutex_count = strategy.mutex_count(),
            diagnostics = config.diagnostics,
            strategy = std::any::type_name::<S>(),
            "sharded map created"
        );
        Self {
            router: ShardRouter::new(config.shard_count),
            shards: build_shards(config.shard_count, config.shard_capacity()),
            strategy,
            observer: Box::new(TracingObserver),
            diagnostics: config.diagnostics,
        }
    }

    /// Replaces the observer notified after every lock acquisition.
    ///
    /// The observer is only called when diagnostics are enabled in the
    /// [`MapConfig`].
    pub fn with_observer(mut self, observer: impl AcquireObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn mutex_count(&self) -> usize {
        self.strategy.mutex_count()
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Returns the index of the shard holding `key`.
    pub fn shard_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.router.index(key)
    }

    /// Gets exclusive access to the value of `key`, inserting `V::default()`
    /// if the key is absent.
    ///
    /// **Locking behaviour:** Deadlock if called while the same thread holds a
    /// handle on the same shard (or, for the pooled strategies, on a shard
    /// sharing the needed mutex).
    ///
    /// # Examples
    /// ```
    /// use shardlock::DirectMap;
    ///
    /// let map = DirectMap::<String, u32>::new();
    /// {
    ///     let mut value = map.write_access("key".to_string());
    ///     assert_eq!(*value, 0);
    ///     *value = 42;
    ///     // let _ = map.read_access("key"); // DEADLOCK!
    /// }
    /// assert_eq!(*map.read_access("key").unwrap(), 42);
    /// ```
    pub fn write_access(&self, key: K) -> WriteAccess<'_, V>
    where
        V: Default,
    {
        let (lease, shard) = self.lock_key(&key);
        // Safety: `lease` guards `shard` and moves into the handle with the reference.
        let value = unsafe { shard.table_mut() }.entry(key).or_default();
        WriteAccess::new(lease, value)
    }

    /// Gets exclusive access to the value of `key`, inserting `V::default()`
    /// if the key is absent. The owned key is only built on insertion.
    ///
    /// **Locking behaviour:** Deadlock if called while the same thread holds a
    /// handle on the same shard.
    ///
    /// # Examples
    /// ```
    /// use shardlock::DirectMap;
    ///
    /// let map = DirectMap::<String, u32>::new();
    /// *map.write_access_by_ref("key") += 1;
    /// *map.write_access_by_ref("key") += 1;
    /// assert_eq!(*map.read_access("key").unwrap(), 2);
    /// ```
    pub fn write_access_by_ref<Q>(&self, key: &Q) -> WriteAccess<'_, V>
    where
        K: Borrow<Q> + for<'c> From<&'c Q>,
        Q: Eq + Hash + ?Sized,
        V: Default,
    {
        let (lease, shard) = self.lock_key(key);
        // Safety: `lease` guards `shard` and moves into the handle with the reference.
        let table = unsafe { shard.table_mut() };
        if !table.contains_key(key) {
            table.insert(key.into(), V::default());
        }
        let value = match table.get_mut(key) {
            Some(value) => value,
            None => panic!("impossible: entry vanished from a locked shard!"),
        };
        WriteAccess::new(lease, value)
    }

    /// Gets shared access to the value of an existing key.
    ///
    /// # Errors
    /// [`Error::KeyNotFound`] if the key is absent. The shard is unlocked
    /// before the error is returned.
    ///
    /// **Locking behaviour:** Deadlock if called while the same thread holds a
    /// handle on the same shard.
    ///
    /// # Examples
    /// ```
    /// use shardlock::{DirectMap, Error};
    ///
    /// let map = DirectMap::<u32, u32>::new();
    /// assert_eq!(map.read_access(&1).err(), Some(Error::KeyNotFound));
    /// *map.write_access(1) = 7;
    /// assert_eq!(*map.read_access(&1).unwrap(), 7);
    /// ```
    pub fn read_access<Q>(&self, key: &Q) -> Result<ReadAccess<'_, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let (lease, shard) = self.lock_key(key);
        // Safety: `lease` guards `shard` and moves into the handle with the reference.
        let value = unsafe { shard.table() }
            .get(key)
            .ok_or(Error::KeyNotFound)?;
        Ok(ReadAccess::new(lease, value))
    }

    /// Checks whether `key` is present, keeping its shard locked for as long
    /// as the returned handle lives.
    pub fn presence<Q>(&self, key: &Q) -> Presence<'_>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let (lease, shard) = self.lock_key(key);
        // Safety: `lease` is held for the lookup.
        let present = unsafe { shard.table() }.contains_key(key);
        Presence::new(lease, present)
    }

    /// Returns `true` if `key` is present.
    ///
    /// # Examples
    /// ```
    /// use shardlock::DynamicPoolMap;
    ///
    /// let map = DynamicPoolMap::<u32, u32>::try_new(8, 2).unwrap();
    /// assert!(!map.contains(&5));
    /// drop(map.write_access(5));
    /// assert!(map.contains(&5));
    /// ```
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.presence(key).is_present()
    }

    /// Copies the whole map into a plain `HashMap`.
    ///
    /// Shards are locked and copied one at a time, in index order, so each
    /// shard's copy is atomic but the result is not a single point-in-time
    /// view: writers may change a shard after it was copied.
    ///
    /// **Locking behaviour:** Deadlock if called while the same thread holds
    /// any handle on this map.
    pub fn snapshot(&self) -> Snapshot<K, V>
    where
        K: Clone,
        V: Clone,
    {
        let mut result = Snapshot::with_hasher(RandomState::default());
        for (index, shard) in self.shards.iter().enumerate() {
            let _lease = self.lock_shard(index);
            // Safety: `_lease` guards this shard until the end of the iteration.
            let table = unsafe { shard.table() };
            result.extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        result
    }

    /// Counts the entries, locking one shard at a time.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .enumerate()
            .map(|(index, shard)| {
                let _lease = self.lock_shard(index);
                // Safety: `_lease` guards this shard for the count.
                unsafe { shard.table() }.len()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_key<Q>(&self, key: &Q) -> (Lease<'_>, &Shard<K, V>)
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        let index = self.router.index(key);
        (self.lock_shard(index), &self.shards[index])
    }

    fn lock_shard(&self, shard: usize) -> Lease<'_> {
        let lease = self.strategy.acquire(shard);
        if self.diagnostics {
            self.observer.on_acquire(AcquireEvent {
                shard,
                mutex: lease.mutex(),
            });
        }
        lease
    }
}
