// Modified from https://github.com/rust-lang/rust/blob/master/library/std/src/sys/sync/mutex/futex.rs
use std::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

const FREE: u32 = 0;
const HELD: u32 = 1; // held, nobody parked
const CONTENDED: u32 = 2; // held, and at least one thread may be parked

/// Number of relaxed loads performed before a waiter parks on the futex.
const SPIN_LIMIT: u32 = 100;

/// A futex-backed mutual exclusion primitive without associated data.
///
/// `RawMutex` is the entry type of the mutex pool and the per-shard admission
/// gate of the dynamic strategy. It is released explicitly with
/// [`unlock`](Self::unlock); the owning `Lease` does that on drop, so the lock
/// is never poisoned.
///
/// The value must not move while held, which is why pools store it in a
/// boxed slice built once.
pub struct RawMutex {
    state: AtomicU32,
}

impl RawMutex {
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(FREE),
        }
    }

    /// Takes the lock if it is free, without waiting.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(FREE, HELD, Acquire, Relaxed)
            .is_ok()
    }

    /// Blocks until the lock is taken by the calling thread.
    #[inline]
    pub fn lock(&self) {
        if !self.try_lock() {
            self.lock_slow();
        }
    }

    #[cold]
    fn lock_slow(&self) {
        let mut state = self.spin_while_held();

        if state == FREE {
            match self.state.compare_exchange(FREE, HELD, Acquire, Relaxed) {
                Ok(_) => return,
                Err(current) => state = current,
            }
        }

        loop {
            // Marking the lock CONTENDED obliges the next unlock to wake someone.
            if state != CONTENDED && self.state.swap(CONTENDED, Acquire) == FREE {
                return;
            }
            atomic_wait::wait(&self.state, CONTENDED);
            state = self.spin_while_held();
        }
    }

    fn spin_while_held(&self) -> u32 {
        let mut remaining = SPIN_LIMIT;
        loop {
            let state = self.state.load(Relaxed);
            if state != HELD || remaining == 0 {
                return state;
            }
            std::hint::spin_loop();
            remaining -= 1;
        }
    }

    /// Releases the lock.
    ///
    /// Must only be called by the thread that currently owns it.
    #[inline]
    pub fn unlock(&self) {
        if self.state.swap(FREE, Release) == CONTENDED {
            // Waking one is enough: it re-marks the lock CONTENDED when it
            // takes it, so the remaining waiters are woken in turn.
            atomic_wait::wake_one(&self.state);
        }
    }

    /// Whether some thread currently owns the lock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Relaxed) != FREE
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}
