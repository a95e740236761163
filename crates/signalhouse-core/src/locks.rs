//! Per-key mutual exclusion
//!
//! Schema operations on one category must never interleave (two concurrent
//! `ALTER` sequences against the same super-table are unsafe on the engine),
//! while operations on different categories run fully in parallel.
//! [`KeyedLocks`] hands out one async mutex per key.
//!
//! Entries stay in the map until [`KeyedLocks::remove`] is called for their
//! key. Callers remove a key once the thing it guards is gone (a deleted
//! stream task); long-lived keys such as category codes are bounded by the
//! catalog.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type LockMap = Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>;

#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: LockMap,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.handle(key).await.lock_owned().await
    }

    /// Forget the lock for `key`.
    ///
    /// A guard that is already held stays valid; the next `lock` for the key
    /// starts a fresh mutex.
    pub async fn remove(&self, key: &str) {
        self.locks.write().await.remove(key);
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        // Fast path: the lock already exists
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(key) {
                return Arc::clone(lock);
            }
        }

        // Slow path: double-check under the write lock
        let mut locks = self.locks.write().await;
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("motor").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len().await, 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _motor = locks.lock("motor").await;
        let pump = tokio::time::timeout(Duration::from_millis(100), locks.lock("pump")).await;
        assert!(pump.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_evicts_key() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.lock("task-1").await;
            locks.remove("task-1").await;
            assert!(locks.is_empty().await);
        }
        let _again = tokio::time::timeout(Duration::from_millis(100), locks.lock("task-1"))
            .await
            .unwrap();
        assert_eq!(locks.len().await, 1);
        locks.remove("missing").await;
        assert_eq!(locks.len().await, 1);
    }
}
