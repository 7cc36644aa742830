use papaya::HashMap as PapayaHashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use wardflow_storage::LockKey;

/// Per-row async mutexes, created on first use and kept for the lifetime of
/// the store.
#[derive(Default)]
pub(crate) struct LockTable {
    locks: PapayaHashMap<LockKey, Arc<Mutex<()>>>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, key: &LockKey) -> OwnedMutexGuard<()> {
        let mutex = {
            let guard = self.locks.pin();
            guard
                .get_or_insert_with(key.clone(), || Arc::new(Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.pin().len()
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("rows", &self.len())
            .finish()
    }
}
