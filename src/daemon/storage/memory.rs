use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use super::{entities::DailyUsage, usage_store::UsageStore, StoreError};

/// [UsageStore] kept in memory, with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    usage: Mutex<DailyUsage>,
    unavailable: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn snapshot(&self) -> DailyUsage {
        self.usage.lock().unwrap().clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl UsageStore for MemoryStore {
    async fn load(&self) -> Result<DailyUsage, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Read(io::Error::other("store is unavailable")));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, usage: &DailyUsage) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Write(io::Error::other("store is unavailable")));
        }
        *self.usage.lock().unwrap() = usage.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
