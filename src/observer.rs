/// Describes which pool mutex served which shard for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcquireEvent {
    pub shard: usize,
    pub mutex: usize,
}

/// Receives one event per lock acquisition when diagnostics are enabled.
///
/// The observer runs on the acquiring thread while the shard is held, so it
/// should be quick and must not access the same map.
///
/// Any `Fn(AcquireEvent) + Send + Sync` closure is an observer.
pub trait AcquireObserver: Send + Sync {
    fn on_acquire(&self, event: AcquireEvent);
}

impl<F> AcquireObserver for F
where
    F: Fn(AcquireEvent) + Send + Sync,
{
    fn on_acquire(&self, event: AcquireEvent) {
        self(event)
    }
}

/// The default observer: one `trace`-level record per acquisition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AcquireObserver for TracingObserver {
    fn on_acquire(&self, event: AcquireEvent) {
        tracing::trace!(shard = event.shard, mutex = event.mutex, "mutex acquired for shard");
    }
}
