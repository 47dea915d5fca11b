//! In-process advisory locks keyed by external identifier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of named async locks, created on demand.
///
/// Entries only live as long as someone holds or waits on them. Locking
/// several keys at once always acquires them in sorted order, so two callers
/// with overlapping key sets can't deadlock.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedLocks {
    locks: Arc<Mutex<HashMap<String, Weak<AsyncMutex<()>>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub(crate) struct KeyedGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub(crate) async fn lock_all(&self, keys: impl IntoIterator<Item = String>) -> KeyedGuard {
        let mut keys: Vec<String> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            // A poisoned map only means another task panicked mid-insert.
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);
            keys.iter()
                .map(|key| match locks.get(key).and_then(Weak::upgrade) {
                    Some(lock) => lock,
                    None => {
                        let lock = Arc::new(AsyncMutex::new(()));
                        locks.insert(key.clone(), Arc::downgrade(&lock));
                        lock
                    },
                })
                .collect()
        };
        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        KeyedGuard { _guards: guards }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| lock.strong_count() > 0);
        locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_overlapping_keys_serialize() {
        let locks = KeyedLocks::default();
        let guard = locks.lock_all(["isbn:1".to_string(), "goodreads:2".to_string()]).await;
        let other = locks.clone();
        let waiter = tokio::spawn(async move { other.lock_all(["isbn:1".to_string()]).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = KeyedLocks::default();
        let _first = locks.lock_all(["isbn:1".to_string()]).await;
        let _second = locks.lock_all(["isbn:2".to_string(), "isbn:2".to_string()]).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_dropped_when_released() {
        let locks = KeyedLocks::default();
        drop(locks.lock_all(["imdb:tt1".to_string()]).await);
        assert_eq!(locks.len(), 0);
    }
}
