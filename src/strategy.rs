use crate::{AdmissionController, AdmissionFlag, MapConfig, MutexPool, RawMutex, Result};

/// The locks held for one access to one shard.
///
/// Dropping a lease releases everything it holds: the pool mutex first, then,
/// for the dynamic strategy, the mutex reservation flag and the shard gate.
/// Every access handle and the snapshot builder release through this one
/// `Drop`, so release never depends on the kind of access.
#[must_use = "the shard is unlocked as soon as the lease is dropped"]
pub struct Lease<'a> {
    shard: usize,
    mutex: usize,
    lock: &'a RawMutex,
    admission: Option<Admission<'a>>,
}

struct Admission<'a> {
    gate: &'a RawMutex,
    flag: &'a AdmissionFlag,
}

impl<'a> Lease<'a> {
    /// Wraps a pool mutex that the caller has already locked.
    fn locked(shard: usize, mutex: usize, lock: &'a RawMutex) -> Self {
        Self {
            shard,
            mutex,
            lock,
            admission: None,
        }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn mutex(&self) -> usize {
        self.mutex
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
        if let Some(admission) = self.admission.take() {
            admission.flag.release();
            admission.gate.unlock();
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Direct {}
    impl Sealed for super::StaticPool {}
    impl Sealed for super::DynamicPool {}
}

/// A way of choosing and taking the lock that guards a shard.
///
/// The map hands out `&mut V` on the strength of a [`Lease`], so a strategy
/// must never let two live leases guard the same shard. The trait is sealed:
/// only [`Direct`], [`StaticPool`] and [`DynamicPool`] implement it.
///
/// ```compile_fail
/// use shardlock::{Direct, Lease, LockStrategy, MapConfig, Result};
///
/// struct Custom(Direct);
///
/// impl LockStrategy for Custom {
///     fn from_config(config: &MapConfig) -> Result<Self> {
///         Direct::from_config(config).map(Custom)
///     }
///
///     fn mutex_count(&self) -> usize {
///         self.0.mutex_count()
///     }
///
///     fn acquire(&self, shard: usize) -> Lease<'_> {
///         self.0.acquire(shard)
///     }
/// }
/// ```
pub trait LockStrategy: sealed::Sealed + Send + Sync + Sized {
    /// Builds the strategy, rejecting layouts it cannot serve.
    fn from_config(config: &MapConfig) -> Result<Self>;

    /// Size of the lock pool.
    fn mutex_count(&self) -> usize;

    /// Blocks until the calling thread exclusively guards `shard`.
    fn acquire(&self, shard: usize) -> Lease<'_>;
}

/// One mutex per shard: shard `i` is always guarded by mutex `i`.
#[derive(Debug)]
pub struct Direct {
    pool: MutexPool,
}

impl Direct {
    /// Unchecked: callers pass a non-zero shard count.
    pub(crate) fn new(shard_count: usize) -> Self {
        Self {
            pool: MutexPool::new(shard_count),
        }
    }
}

impl LockStrategy for Direct {
    fn from_config(config: &MapConfig) -> Result<Self> {
        config.validate()?;
        match config.mutex_count {
            Some(count) if count != config.shard_count => {
                Err(crate::Error::invalid_config(format!(
                    "direct locking needs mutex_count == shard_count, got {count} mutexes for {} shards",
                    config.shard_count
                )))
            }
            _ => Ok(Self::new(config.shard_count)),
        }
    }

    fn mutex_count(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    fn acquire(&self, shard: usize) -> Lease<'_> {
        let lock = self.pool.get(shard);
        lock.lock();
        Lease::locked(shard, shard, lock)
    }
}

/// A fixed pool of mutexes where shard `i` is always guarded by mutex
/// `i % mutex_count`. Shards sharing a mutex serialize with each other.
#[derive(Debug)]
pub struct StaticPool {
    pool: MutexPool,
}

impl StaticPool {
    /// The pool slot guarding `shard`.
    #[inline]
    pub fn mutex_for(&self, shard: usize) -> usize {
        shard % self.pool.len()
    }
}

impl LockStrategy for StaticPool {
    fn from_config(config: &MapConfig) -> Result<Self> {
        let mutex_count = config.required_mutex_count()?;
        if mutex_count > config.shard_count {
            tracing::warn!(
                mutex_count,
                shard_count = config.shard_count,
                "static pool has more mutexes than shards, the surplus is never used"
            );
        }
        Ok(Self {
            pool: MutexPool::new(mutex_count),
        })
    }

    fn mutex_count(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    fn acquire(&self, shard: usize) -> Lease<'_> {
        let mutex = self.mutex_for(shard);
        let lock = self.pool.get(mutex);
        lock.lock();
        Lease::locked(shard, mutex, lock)
    }
}

/// A pool of mutexes assigned per access through admission control.
///
/// An access first passes its shard's gate, then reserves the first free
/// mutex found scanning from `shard % mutex_count`, then locks it. The
/// shard-to-mutex mapping therefore varies from call to call, which spreads
/// skewed load over the whole pool.
#[derive(Debug)]
pub struct DynamicPool {
    pool: MutexPool,
    admission: AdmissionController,
}

impl DynamicPool {
    pub fn is_shard_admitted(&self, shard: usize) -> bool {
        self.admission.is_shard_admitted(shard)
    }

    pub fn is_mutex_reserved(&self, mutex: usize) -> bool {
        self.admission.is_mutex_reserved(mutex)
    }

    /// Number of shards with an operation in flight.
    pub fn admitted_shards(&self) -> usize {
        self.admission.admitted_shards()
    }

    /// Number of pool mutexes currently reserved.
    pub fn reserved_mutexes(&self) -> usize {
        self.admission.reserved_mutexes()
    }

    /// Number of pool mutexes currently locked.
    pub fn locked_mutexes(&self) -> usize {
        self.pool.locked()
    }
}

impl LockStrategy for DynamicPool {
    fn from_config(config: &MapConfig) -> Result<Self> {
        let mutex_count = config.required_mutex_count()?;
        Ok(Self {
            pool: MutexPool::new(mutex_count),
            admission: AdmissionController::new(config.shard_count, mutex_count),
        })
    }

    fn mutex_count(&self) -> usize {
        self.pool.len()
    }

    fn acquire(&self, shard: usize) -> Lease<'_> {
        let gate = self.admission.admit_shard(shard);
        let mutex = self.admission.reserve_mutex(shard % self.pool.len());
        let lock = self.pool.get(mutex);
        // The reservation makes this uncontended.
        lock.lock();
        Lease {
            shard,
            mutex,
            lock,
            admission: Some(Admission {
                gate,
                flag: self.admission.mutex_flag(mutex),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    #[test]
    fn test_direct() {
        let direct = Direct::from_config(&MapConfig::new(4)).unwrap();
        assert_eq!(direct.mutex_count(), 4);
        let lease = direct.acquire(2);
        assert_eq!((lease.shard(), lease.mutex()), (2, 2));
        assert!(direct.pool.get(2).is_locked());
        drop(lease);
        assert_eq!(direct.pool.locked(), 0);

        assert!(Direct::from_config(&MapConfig::new(4).mutex_count(4)).is_ok());
        assert!(matches!(
            Direct::from_config(&MapConfig::new(4).mutex_count(3)),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Direct::from_config(&MapConfig::new(0)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_static_pool_mapping() {
        let pool = StaticPool::from_config(&MapConfig::new(7).mutex_count(3)).unwrap();
        assert_eq!(pool.mutex_count(), 3);
        let mapping = (0..7).map(|s| pool.mutex_for(s)).collect::<Vec<_>>();
        assert_eq!(mapping, vec![0, 1, 2, 0, 1, 2, 0]);

        // The boundary shard index == pool size wraps to the first mutex.
        let lease = pool.acquire(3);
        assert_eq!(lease.mutex(), 0);
        assert!(pool.pool.get(0).is_locked());
        drop(lease);
        assert_eq!(pool.pool.locked(), 0);
    }

    #[test]
    fn test_static_pool_requires_mutex_count() {
        assert!(matches!(
            StaticPool::from_config(&MapConfig::new(4)),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            StaticPool::from_config(&MapConfig::new(4).mutex_count(0)),
            Err(Error::InvalidConfiguration(_))
        ));
        // Surplus mutexes are allowed.
        assert!(StaticPool::from_config(&MapConfig::new(2).mutex_count(5)).is_ok());
    }

    #[test]
    fn test_dynamic_pool_lease() {
        let pool = DynamicPool::from_config(&MapConfig::new(4).mutex_count(3)).unwrap();
        let first = pool.acquire(1);
        assert_eq!(first.mutex(), 1);
        assert!(pool.is_shard_admitted(1));
        assert!(pool.is_mutex_reserved(1));

        // Another shard scans past the reserved mutex.
        let second = pool.acquire(2);
        assert_eq!(second.mutex(), 2);
        let third = pool.acquire(0);
        assert_eq!(third.mutex(), 0);
        assert_eq!(pool.reserved_mutexes(), 3);
        assert_eq!(pool.locked_mutexes(), 3);
        assert_eq!(pool.admitted_shards(), 3);

        drop(first);
        assert!(!pool.is_shard_admitted(1));
        assert!(!pool.is_mutex_reserved(1));
        let fourth = pool.acquire(3);
        assert_eq!(fourth.mutex(), 1);

        drop((second, third, fourth));
        assert_eq!(pool.admitted_shards(), 0);
        assert_eq!(pool.reserved_mutexes(), 0);
        assert_eq!(pool.locked_mutexes(), 0);
    }

    fn check_shard_lease_is_exclusive<S: LockStrategy + 'static>(strategy: S) {
        let strategy = Arc::new(strategy);
        let entered = Arc::new(AtomicBool::new(false));
        let held = strategy.acquire(1);

        let waiter = {
            let strategy = strategy.clone();
            let entered = entered.clone();
            std::thread::spawn(move || {
                let lease = strategy.acquire(1);
                entered.store(true, Ordering::Release);
                lease.mutex()
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::Acquire), "second lease on a held shard");

        drop(held);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::Acquire));
    }

    #[test]
    fn test_shard_lease_is_exclusive() {
        check_shard_lease_is_exclusive(Direct::from_config(&MapConfig::new(3)).unwrap());
        check_shard_lease_is_exclusive(
            StaticPool::from_config(&MapConfig::new(4).mutex_count(3)).unwrap(),
        );
        check_shard_lease_is_exclusive(
            DynamicPool::from_config(&MapConfig::new(4).mutex_count(3)).unwrap(),
        );
    }

    #[test]
    fn test_dynamic_pool_same_origin_shards() {
        // Shards 0 and 3 both scan from mutex 0.
        let pool = Arc::new(DynamicPool::from_config(&MapConfig::new(6).mutex_count(3)).unwrap());
        let held = pool.acquire(0);
        assert_eq!(held.mutex(), 0);

        // The second shard is not blocked by the first and lands elsewhere.
        let other = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.acquire(3).mutex())
        };
        assert_eq!(other.join().unwrap(), 1);
        drop(held);

        const THREADS: usize = 4;
        const ROUNDS: usize = 1 << 12;
        let live = Arc::new((0..3).map(|_| AtomicU32::new(0)).collect::<Vec<_>>());
        let barrier = Arc::new(Barrier::new(THREADS));
        let threads = (0..THREADS)
            .map(|i| {
                let pool = pool.clone();
                let live = live.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let shard = if i % 2 == 0 { 0 } else { 3 };
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        let lease = pool.acquire(shard);
                        let count = &live[lease.mutex()];
                        assert_eq!(count.fetch_add(1, Ordering::AcqRel), 0, "mutex shared");
                        count.fetch_sub(1, Ordering::AcqRel);
                    }
                })
            })
            .collect::<Vec<_>>();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert_eq!(pool.admitted_shards(), 0);
        assert_eq!(pool.reserved_mutexes(), 0);
        assert_eq!(pool.locked_mutexes(), 0);
    }

    #[test]
    fn test_dynamic_pool_requires_mutex_count() {
        assert!(matches!(
            DynamicPool::from_config(&MapConfig::new(4)),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DynamicPool::from_config(&MapConfig::new(0).mutex_count(2)),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
