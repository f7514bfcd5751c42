//! Per-(user, period) serialization of recurring materialization.
//!
//! [`PeriodLocks`] hands out one [`tokio::sync::Mutex`] per key. Callers
//! materializing the same user and month queue behind each other while
//! different users or months proceed concurrently. Storage uniqueness
//! still backs idempotence across processes; the lock only removes the
//! wasted work of racing writers inside one process.
//!
//! A key lives in the registry only while someone holds or waits on it.
//! The last [`PeriodGuard`] to drop removes its entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{Period, UserId};

type Key = (UserId, Period);
type Table = HashMap<Key, Arc<Mutex<()>>>;

/// Registry of materialization locks keyed by user and period.
///
/// The table itself sits behind a blocking mutex that is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct PeriodLocks {
    table: Arc<StdMutex<Table>>,
}

/// Exclusive access to one `(user, period)` key.
#[derive(Debug)]
pub struct PeriodGuard {
    // Field order matters: the mutex guard drops before the entry is released.
    _guard: OwnedMutexGuard<()>,
    _release: Release,
}

/// Removes the key from the table once no other caller references it.
#[derive(Debug)]
struct Release {
    key: Key,
    table: Arc<StdMutex<Table>>,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.key);
        }
    }
}

impl PeriodLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `(user, period)`. Dropping the
    /// returned guard releases the key, and the entry too when nobody
    /// else is waiting on it.
    pub async fn acquire(&self, user: UserId, period: Period) -> PeriodGuard {
        let key = (user, period);
        // Bound before the lock so a cancelled wait still cleans up.
        let release = Release {
            key,
            table: Arc::clone(&self.table),
        };
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(key).or_default())
        };
        PeriodGuard {
            _guard: lock.lock_owned().await,
            _release: release,
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn period(month: u32) -> Period {
        let Ok(p) = Period::new(month, 2024) else {
            panic!("valid period");
        };
        p
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = PeriodLocks::new();
        let user = UserId::new();
        let guard = locks.acquire(user, period(3)).await;

        let second =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(user, period(3))).await;
        assert!(second.is_err(), "second caller must wait");

        drop(guard);
        let third =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(user, period(3))).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = PeriodLocks::new();
        let user = UserId::new();
        let _march = locks.acquire(user, period(3)).await;

        let april =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(user, period(4))).await;
        let Ok(april) = april else {
            panic!("april must not wait on march");
        };
        let other_user = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(UserId::new(), period(3)),
        )
        .await;
        let Ok(other_user) = other_user else {
            panic!("another user must not wait");
        };
        assert_eq!(locks.len(), 3);
        drop(april);
        drop(other_user);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn dropped_guards_leave_no_entries() {
        let locks = PeriodLocks::new();
        let user = UserId::new();
        let held = locks.acquire(user, period(1)).await;
        drop(locks.acquire(user, period(2)).await);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn waiter_keeps_entry_until_it_finishes() {
        let locks = Arc::new(PeriodLocks::new());
        let user = UserId::new();
        let held = locks.acquire(user, period(6)).await;

        let waiter = tokio::spawn({
            let locks = Arc::clone(&locks);
            async move {
                let _guard = locks.acquire(user, period(6)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(locks.len(), 1, "entry survives while the waiter needs it");

        let Ok(()) = waiter.await else {
            panic!("waiter task");
        };
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_wait_leaves_no_entry() {
        let locks = PeriodLocks::new();
        let user = UserId::new();
        let held = locks.acquire(user, period(7)).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(user, period(7))).await;
        assert!(timed_out.is_err());
        drop(held);
        assert!(locks.is_empty());
    }
}
