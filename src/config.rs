use crate::{Error, Result};
use std::sync::OnceLock;

/// Returns the default number of shards: four per available core, rounded up
/// to a power of two.
pub fn default_shard_count() -> usize {
    static DEFAULT_SHARD_COUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SHARD_COUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

/// Construction options for a [`ShardedMap`](crate::ShardedMap).
///
/// The meaning of `mutex_count` depends on the lock strategy:
///
/// * `Direct` - optional; when given it must equal `shard_count`.
/// * `StaticPool` - required; shard `i` is guarded by mutex `i % mutex_count`.
/// * `DynamicPool` - required; any mutex may serve any shard.
///
/// # Examples
/// ```
/// use shardlock::{DynamicPoolMap, MapConfig};
///
/// let config = MapConfig::new(16).mutex_count(4).diagnostics(true);
/// let map = DynamicPoolMap::<u32, u32>::try_with_config(config).unwrap();
/// assert_eq!(map.shard_count(), 16);
/// assert_eq!(map.mutex_count(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    /// Number of independent partitions. Must be greater than zero.
    pub shard_count: usize,
    /// Size of the lock pool.
    pub mutex_count: Option<usize>,
    /// Total initial capacity, spread evenly over the shards.
    pub capacity: usize,
    /// Report every lock acquisition to the map's observer.
    pub diagnostics: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new(default_shard_count())
    }
}

impl MapConfig {
    pub fn new(shard_count: usize) -> Self {
        Self {
            shard_count,
            mutex_count: None,
            capacity: 0,
            diagnostics: false,
        }
    }

    pub fn mutex_count(mut self, mutex_count: usize) -> Self {
        self.mutex_count = Some(mutex_count);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Checks the counts shared by every strategy.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::invalid_config("shard_count must be > 0"));
        }
        if self.mutex_count == Some(0) {
            return Err(Error::invalid_config("mutex_count must be > 0"));
        }
        Ok(())
    }

    /// Returns the configured pool size, failing if none was given.
    pub(crate) fn required_mutex_count(&self) -> Result<usize> {
        self.validate()?;
        self.mutex_count
            .ok_or_else(|| Error::invalid_config("mutex_count is required for pooled strategies"))
    }

    pub(crate) fn shard_capacity(&self) -> usize {
        self.capacity / self.shard_count.max(1)
    }
}
