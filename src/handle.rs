use crate::Lease;
use std::ops::{Deref, DerefMut};

/// An RAII guard providing exclusive, mutable access to one value.
///
/// Returned by [`ShardedMap::write_access`](crate::ShardedMap::write_access).
/// The shard stays locked until the guard is dropped.
///
/// # Examples
/// ```
/// use shardlock::DirectMap;
///
/// let map = DirectMap::<&str, u32>::new();
/// {
///     let mut value = map.write_access("key");
///     *value += 1;
///     // Unlocked here.
/// }
/// assert_eq!(*map.read_access("key").unwrap(), 1);
/// ```
pub struct WriteAccess<'a, V> {
    value: &'a mut V,
    lease: Lease<'a>,
}

impl<'a, V> WriteAccess<'a, V> {
    pub(crate) fn new(lease: Lease<'a>, value: &'a mut V) -> Self {
        Self { value, lease }
    }

    pub fn shard_index(&self) -> usize {
        self.lease.shard()
    }

    pub fn mutex_index(&self) -> usize {
        self.lease.mutex()
    }
}

impl<V> Deref for WriteAccess<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &*self.value
    }
}

impl<V> DerefMut for WriteAccess<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut *self.value
    }
}

/// An RAII guard providing shared access to one existing value.
///
/// Returned by [`ShardedMap::read_access`](crate::ShardedMap::read_access).
/// The shard stays locked, for readers as well as writers, until the guard is
/// dropped.
pub struct ReadAccess<'a, V> {
    value: &'a V,
    lease: Lease<'a>,
}

impl<'a, V> ReadAccess<'a, V> {
    pub(crate) fn new(lease: Lease<'a>, value: &'a V) -> Self {
        Self { value, lease }
    }

    pub fn shard_index(&self) -> usize {
        self.lease.shard()
    }

    pub fn mutex_index(&self) -> usize {
        self.lease.mutex()
    }
}

impl<V> Deref for ReadAccess<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value
    }
}

/// An RAII guard holding the answer to "is this key present?".
///
/// The answer stays valid while the guard lives, because the shard cannot
/// change until it is dropped.
pub struct Presence<'a> {
    present: bool,
    lease: Lease<'a>,
}

impl<'a> Presence<'a> {
    pub(crate) fn new(lease: Lease<'a>, present: bool) -> Self {
        Self { present, lease }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn shard_index(&self) -> usize {
        self.lease.shard()
    }

    pub fn mutex_index(&self) -> usize {
        self.lease.mutex()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for WriteAccess<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAccess")
            .field("shard", &self.shard_index())
            .field("mutex", &self.mutex_index())
            .field("value", &self.value)
            .finish()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for ReadAccess<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadAccess")
            .field("shard", &self.shard_index())
            .field("mutex", &self.mutex_index())
            .field("value", &self.value)
            .finish()
    }
}

impl std::fmt::Debug for Presence<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presence")
            .field("shard", &self.shard_index())
            .field("mutex", &self.mutex_index())
            .field("present", &self.present)
            .finish()
    }
}
