use crate::RawMutex;

/// A fixed collection of locks, sized independently of the shard count.
///
/// The locks live in a boxed slice that is built once, so no lock is ever
/// moved while a thread may be parked on it.
#[derive(Debug)]
pub struct MutexPool {
    mutexes: Box<[RawMutex]>,
}

impl MutexPool {
    pub fn new(mutex_count: usize) -> Self {
        Self {
            mutexes: (0..mutex_count).map(|_| RawMutex::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &RawMutex {
        &self.mutexes[index]
    }

    /// Number of pool mutexes currently held.
    pub fn locked(&self) -> usize {
        self.mutexes.iter().filter(|m| m.is_locked()).count()
    }
}
