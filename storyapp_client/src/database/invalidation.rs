use std::sync::Arc;
use tokio::sync::watch;

/// Generation counter for the story cache. Every committed write moves the
/// generation forward; readers compare generations to detect stale results.
#[derive(Clone)]
pub struct InvalidationTracker {
    tx: Arc<watch::Sender<u64>>,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn invalidate(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        tracing::trace!(generation = self.generation(), "story cache invalidated");
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}
