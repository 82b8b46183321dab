//! Per-account mutual exclusion

use dashmap::DashMap;
use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;
use std::sync::Arc;
use tracing::trace;

/// Exclusive locks keyed by account ID.
///
/// Operations on different accounts never contend. The lock is not reentrant:
/// acquiring it twice for the same account on one thread deadlocks.
#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held while an account is being read or mutated; released on drop
#[must_use = "the account is unlocked as soon as the guard is dropped"]
pub struct AccountLockGuard {
    account_id: String,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the account's lock is free and take it
    pub fn acquire(&self, account_id: &str) -> AccountLockGuard {
        // Clone the mutex out so the map shard is not held while waiting.
        let mutex = self
            .locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_arc();
        trace!("Acquired lock for account {}", account_id);

        AccountLockGuard {
            account_id: account_id.to_string(),
            _guard: guard,
        }
    }
}

impl AccountLockGuard {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl Drop for AccountLockGuard {
    fn drop(&mut self) {
        trace!("Released lock for account {}", self.account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_account_is_serialized() {
        let locks = AccountLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let overlap = overlap.clone();
                thread::spawn(move || {
                    let _guard = locks.acquire("acc");
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let first = locks.acquire("a");
        // would deadlock if accounts shared a lock
        let second = locks.acquire("b");
        assert_eq!(first.account_id(), "a");
        assert_eq!(second.account_id(), "b");
    }

    #[test]
    fn test_released_on_drop() {
        let locks = AccountLocks::new();
        drop(locks.acquire("a"));
        let _again = locks.acquire("a");
    }
}
