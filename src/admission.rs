//! Admission control for the dynamic pool strategy.
//!
//! Every shard has a gate admitting one logical operation at a time, and
//! every pool mutex has a flag reserving it for the operation that won it.
//! A shard moves through
//!
//! ```text
//! FREE -> SHARD_ADMITTED -> MUTEX_HELD -> (critical section) -> FREE
//! ```
//!
//! for as long as the map lives.
use crate::RawMutex;
use std::sync::atomic::{AtomicU32, Ordering};

const FREE: u32 = 0;
const HELD: u32 = 1;

/// An atomic FREE/HELD marker taken by compare-and-swap.
#[derive(Debug, Default)]
pub struct AdmissionFlag {
    state: AtomicU32,
}

impl AdmissionFlag {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(FREE),
        }
    }

    /// Attempts the FREE -> HELD transition once.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn release(&self) {
        let prev = self.state.swap(FREE, Ordering::Release);
        debug_assert_eq!(prev, HELD, "released an admission flag that was not held");
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.state.load(Ordering::Relaxed) == HELD
    }
}

/// Exponential backoff for the mutex scan: spin a growing number of times,
/// then start yielding the processor.
struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    fn new() -> Self {
        Self { step: 0 }
    }

    fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..1 << self.step {
                std::hint::spin_loop();
            }
        } else {
            std::thread::yield_now();
        }
        if self.step <= Self::YIELD_LIMIT {
            self.step += 1;
        }
    }
}

/// Shard gates and mutex reservation flags of a dynamic pool.
#[derive(Debug)]
pub struct AdmissionController {
    shard_gates: Box<[RawMutex]>,
    mutex_flags: Box<[AdmissionFlag]>,
}

impl AdmissionController {
    pub fn new(shard_count: usize, mutex_count: usize) -> Self {
        Self {
            shard_gates: (0..shard_count).map(|_| RawMutex::new()).collect(),
            mutex_flags: (0..mutex_count).map(|_| AdmissionFlag::new()).collect(),
        }
    }

    /// Blocks until the calling thread is the one operation admitted to
    /// `shard`. Waiters spin briefly and then park instead of burning CPU.
    pub fn admit_shard(&self, shard: usize) -> &RawMutex {
        let gate = &self.shard_gates[shard];
        gate.lock();
        gate
    }

    /// Scans the mutex flags circularly from `origin` until one is reserved
    /// for the caller, and returns its index.
    pub fn reserve_mutex(&self, origin: usize) -> usize {
        let count = self.mutex_flags.len();
        let mut backoff = Backoff::new();
        loop {
            for offset in 0..count {
                let index = (origin + offset) % count;
                if self.mutex_flags[index].try_acquire() {
                    return index;
                }
            }
            backoff.snooze();
        }
    }

    #[inline]
    pub fn mutex_flag(&self, index: usize) -> &AdmissionFlag {
        &self.mutex_flags[index]
    }

    pub fn is_shard_admitted(&self, shard: usize) -> bool {
        self.shard_gates[shard].is_locked()
    }

    pub fn is_mutex_reserved(&self, index: usize) -> bool {
        self.mutex_flags[index].is_held()
    }

    pub fn admitted_shards(&self) -> usize {
        self.shard_gates.iter().filter(|g| g.is_locked()).count()
    }

    pub fn reserved_mutexes(&self) -> usize {
        self.mutex_flags.iter().filter(|f| f.is_held()).count()
    }
}
