//! Per-key async mutexes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A lazily populated map of one async mutex per key.
///
/// Holders of different keys never contend. Waiters on the same key are
/// served in arrival order (tokio's mutex is fair).
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Clone,
{
    /// Creates an empty lock map.
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn handle(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Acquires the lock for a single key.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.handle(key).await.lock_owned().await
    }

    /// Acquires the lock for a key only if nobody holds it.
    pub async fn try_lock(&self, key: &K) -> Option<OwnedMutexGuard<()>> {
        self.handle(key).await.try_lock_owned().ok()
    }

    /// Acquires the locks for several keys in ascending key order.
    ///
    /// Duplicate keys are locked once. Every caller uses the same ordering, so
    /// two callers with overlapping key sets cannot deadlock.
    pub async fn lock_many<I>(&self, keys: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.lock(key).await);
        }
        guards
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock(&"sku-1".to_string()).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(&"sku-1".to_string()).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(&1u32).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&2u32)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn try_lock_skips_held_keys() {
        let locks = KeyedLocks::new();
        let guard = locks.lock(&7u32).await;
        assert!(locks.try_lock(&7u32).await.is_none());
        assert!(locks.try_lock(&8u32).await.is_some());

        drop(guard);
        assert!(locks.try_lock(&7u32).await.is_some());
    }

    #[tokio::test]
    async fn lock_many_dedups_keys() {
        let locks = KeyedLocks::new();
        let guards = locks.lock_many(vec![3u32, 1, 3, 2]).await;
        assert_eq!(guards.len(), 3);
        for key in [1u32, 2, 3] {
            assert!(locks.try_lock(&key).await.is_none());
        }
        drop(guards);
        assert!(locks.try_lock(&3u32).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_lock_many_does_not_deadlock() {
        let locks = Arc::new(KeyedLocks::new());
        let mut tasks = Vec::new();
        for i in 0..16u32 {
            let locks = Arc::clone(&locks);
            tasks.push(tokio::spawn(async move {
                let keys = if i % 2 == 0 { vec![1u32, 2, 3] } else { vec![3u32, 2, 1] };
                let _guards = locks.lock_many(keys).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = async {
            for task in tasks {
                task.await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("lock_many deadlocked");
    }
}
