use tracing::debug;

use crate::daemon::{
    storage::{usage_store::UsageStore, StoreError},
    sync::{SyncHandle, UsageDelta},
};

use super::session::Flush;

/// Applies flushes to the durable store. Every flush is a separate read-modify-write, callers
/// have to make sure flushes don't run concurrently.
pub struct Accumulator<S: UsageStore> {
    store: S,
    sync: Option<SyncHandle>,
}

impl<S: UsageStore> Accumulator<S> {
    pub fn new(store: S, sync: Option<SyncHandle>) -> Self {
        Self { store, sync }
    }

    pub async fn flush(&self, flush: &Flush) -> Result<(), StoreError> {
        if flush.seconds == 0 {
            return Ok(());
        }

        let mut usage = self.store.load().await?;
        let total = usage.add(flush.day, flush.hostname.as_str(), flush.seconds);
        self.store.save(&usage).await?;
        debug!(
            "Recorded {}s on {} for {}, {total}s in total",
            flush.seconds, flush.hostname, flush.day
        );

        if let Some(sync) = &self.sync {
            sync.offer(UsageDelta {
                date: flush.day,
                hostname: flush.hostname.to_string(),
                seconds: flush.seconds,
            });
        }
        Ok(())
    }
}
