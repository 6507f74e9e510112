use foldhash::fast::FixedState;
use std::hash::{BuildHasher, Hash};

/// Maps keys to shard indices.
///
/// Hashing uses a fixed seed, so a key lands on the same shard on every call,
/// from every thread, and in every map with the same shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
    shard_count: usize,
}

impl ShardRouter {
    /// Creates a router over `shard_count` shards. The count must be non-zero;
    /// [`MapConfig::validate`](crate::MapConfig::validate) guarantees that.
    pub fn new(shard_count: usize) -> Self {
        debug_assert!(shard_count > 0);
        Self { shard_count }
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Returns `hash(key) % shard_count`.
    #[inline(always)]
    pub fn index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        FixedState::default().hash_one(key) as usize % self.shard_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_stable() {
        let router = ShardRouter::new(7);
        for key in 0..1000u64 {
            let index = router.index(&key);
            assert!(index < 7);
            assert_eq!(router.index(&key), index);
            assert_eq!(ShardRouter::new(7).index(&key), index);
        }
    }

    #[test]
    fn test_borrowed_forms_agree() {
        let router = ShardRouter::new(16);
        let owned = "hello".to_string();
        assert_eq!(router.index(&owned), router.index("hello"));
    }

    #[test]
    fn test_single_shard() {
        let router = ShardRouter::new(1);
        assert!((0..100u32).all(|key| router.index(&key) == 0));
    }

    #[test]
    fn test_spreads_over_shards() {
        let router = ShardRouter::new(4);
        let mut seen = [false; 4];
        for key in 0..256u32 {
            seen[router.index(&key)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
