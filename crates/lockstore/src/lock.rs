//! Named distributed mutex over a [`LockStore`]
//!
//! Ownership is proven by a random UUID token: release and extend only
//! succeed while the store still maps the key to our token. A blocking
//! acquire polls the store every 10 ms until it succeeds or its waiting
//! budget runs out.
//!
//! Waiters are not queued, so there is no FIFO fairness; under heavy
//! contention a waiter can starve. TTL expiry self-heals a crashed holder.

use crate::store::LockStore;
use crewsync_core::{Error, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Interval between acquisition attempts while blocking
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Named mutex backed by an external lock store
///
/// Construction does not touch the store; [`DistributedLock::acquire`] does.
/// Use [`DistributedLock::acquire_guard`] for the scoped form that releases
/// on every exit path, including panics.
pub struct DistributedLock {
    store: Arc<dyn LockStore>,
    key: String,
    token: String,
    ttl: Duration,
    blocking_timeout: Duration,
    acquired: bool,
}

impl DistributedLock {
    /// Create a lock handle for `key` with the given TTL and blocking budget
    pub fn new(
        store: Arc<dyn LockStore>,
        key: impl Into<String>,
        ttl: Duration,
        blocking_timeout: Duration,
    ) -> Self {
        DistributedLock {
            store,
            key: key.into(),
            token: Uuid::new_v4().to_string(),
            ttl,
            blocking_timeout,
            acquired: false,
        }
    }

    /// The lock key this handle targets
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this handle currently believes it holds the lock
    ///
    /// Advisory only: the store may have expired the lease already.
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Attempt to acquire the lock
    ///
    /// Non-blocking (`blocking = false`): one attempt, `Ok(false)` if the
    /// lock is held elsewhere.
    ///
    /// Blocking (`blocking = true`): retries every 10 ms until acquired or
    /// the blocking budget elapses, then fails with [`Error::LockTimeout`].
    pub fn acquire(&mut self, blocking: bool) -> Result<bool> {
        let started = Instant::now();
        loop {
            if self
                .store
                .set_if_absent(&self.key, &self.token, self.ttl)?
            {
                self.acquired = true;
                tracing::debug!(key = %self.key, ttl_ms = self.ttl.as_millis() as u64, "lock acquired");
                return Ok(true);
            }
            if !blocking {
                return Ok(false);
            }
            if started.elapsed() >= self.blocking_timeout {
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(key = %self.key, waited_ms, "lock wait budget exhausted");
                return Err(Error::LockTimeout {
                    key: self.key.clone(),
                    waited_ms,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Release the lock if we still own it
    ///
    /// A token mismatch means the lease expired and someone else holds the
    /// key now; we log a warning and leave it alone rather than releasing a
    /// lock we no longer own.
    pub fn release(&mut self) -> Result<()> {
        if !self.acquired {
            return Ok(());
        }
        self.acquired = false;
        if self.store.compare_and_delete(&self.key, &self.token)? {
            tracing::debug!(key = %self.key, "lock released");
        } else {
            tracing::warn!(
                key = %self.key,
                "lock token mismatch on release; lease expired and was re-acquired elsewhere"
            );
        }
        Ok(())
    }

    /// Push the lease expiry to `additional` from now
    ///
    /// Fails with [`Error::LockNotOwned`] if we no longer hold the key.
    pub fn extend(&mut self, additional: Duration) -> Result<()> {
        if self.acquired
            && self
                .store
                .compare_and_extend(&self.key, &self.token, additional)?
        {
            tracing::debug!(key = %self.key, extend_ms = additional.as_millis() as u64, "lock extended");
            return Ok(());
        }
        self.acquired = false;
        Err(Error::LockNotOwned {
            key: self.key.clone(),
        })
    }

    /// Acquire and wrap in an RAII guard
    ///
    /// Blocking mode propagates [`Error::LockTimeout`]; non-blocking mode
    /// maps contention to [`Error::LockAcquisition`] so callers always get
    /// either a guard or a typed error.
    pub fn acquire_guard(mut self, blocking: bool) -> Result<LockGuard> {
        if self.acquire(blocking)? {
            Ok(LockGuard { lock: self })
        } else {
            Err(Error::LockAcquisition { key: self.key })
        }
    }
}

/// Scoped lock ownership: releases on drop, on every exit path
///
/// Dropping the guard performs the token-checked release. Release failures
/// during drop are logged, never panicked on.
pub struct LockGuard {
    lock: DistributedLock,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.lock.key())
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// The lock key this guard holds
    pub fn key(&self) -> &str {
        self.lock.key()
    }

    /// Extend the held lease, see [`DistributedLock::extend`]
    pub fn extend(&mut self, additional: Duration) -> Result<()> {
        self.lock.extend(additional)
    }

    /// Release eagerly instead of waiting for drop
    pub fn release(mut self) -> Result<()> {
        self.lock.release()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            tracing::warn!(key = %self.lock.key, error = %e, "lock release failed during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLockStore;

    const TTL: Duration = Duration::from_secs(5);

    fn lock_for(store: &Arc<MemoryLockStore>, key: &str) -> DistributedLock {
        DistributedLock::new(
            Arc::clone(store) as Arc<dyn LockStore>,
            key,
            TTL,
            Duration::from_millis(100),
        )
    }

    #[test]
    fn non_blocking_acquire_reports_contention() {
        let store = Arc::new(MemoryLockStore::new());
        let mut a = lock_for(&store, "res:1");
        let mut b = lock_for(&store, "res:1");
        assert!(a.acquire(false).unwrap());
        assert!(!b.acquire(false).unwrap());
        a.release().unwrap();
        assert!(b.acquire(false).unwrap());
    }

    #[test]
    fn blocking_acquire_times_out() {
        let store = Arc::new(MemoryLockStore::new());
        let mut a = lock_for(&store, "res:1");
        let mut b = lock_for(&store, "res:1");
        assert!(a.acquire(false).unwrap());
        let err = b.acquire(true).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
    }

    #[test]
    fn blocking_acquire_succeeds_when_released_in_time() {
        let store = Arc::new(MemoryLockStore::new());
        let mut a = lock_for(&store, "res:1");
        assert!(a.acquire(false).unwrap());

        let store2 = Arc::clone(&store);
        let waiter = thread::spawn(move || {
            let mut b = DistributedLock::new(
                store2 as Arc<dyn LockStore>,
                "res:1",
                TTL,
                Duration::from_secs(2),
            );
            b.acquire(true)
        });
        thread::sleep(Duration::from_millis(30));
        a.release().unwrap();
        assert!(waiter.join().unwrap().unwrap());
    }

    #[test]
    fn extend_fails_after_expiry_and_takeover() {
        let store = Arc::new(MemoryLockStore::new());
        let mut a = DistributedLock::new(
            Arc::clone(&store) as Arc<dyn LockStore>,
            "res:1",
            Duration::from_millis(20),
            Duration::from_millis(100),
        );
        assert!(a.acquire(false).unwrap());
        thread::sleep(Duration::from_millis(40));
        let mut b = lock_for(&store, "res:1");
        assert!(b.acquire(false).unwrap());

        let err = a.extend(TTL).unwrap_err();
        assert!(matches!(err, Error::LockNotOwned { .. }));
        // b's lease is untouched
        assert!(b.extend(TTL).is_ok());
    }

    #[test]
    fn release_without_acquire_is_noop() {
        let store = Arc::new(MemoryLockStore::new());
        let mut a = lock_for(&store, "res:1");
        a.release().unwrap();
        assert_eq!(store.live_leases(), 0);
    }

    #[test]
    fn guard_releases_on_drop() {
        let store = Arc::new(MemoryLockStore::new());
        {
            let _guard = lock_for(&store, "res:1").acquire_guard(false).unwrap();
            assert_eq!(store.live_leases(), 1);
        }
        assert_eq!(store.live_leases(), 0);
    }

    #[test]
    fn guard_releases_on_panic() {
        let store = Arc::new(MemoryLockStore::new());
        let store2 = Arc::clone(&store);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = DistributedLock::new(
                store2 as Arc<dyn LockStore>,
                "res:1",
                TTL,
                Duration::from_millis(100),
            )
            .acquire_guard(false)
            .unwrap();
            panic!("critical section blew up");
        }));
        assert!(result.is_err());
        assert_eq!(store.live_leases(), 0);
    }

    #[test]
    fn non_blocking_guard_maps_contention_to_error() {
        let store = Arc::new(MemoryLockStore::new());
        let _held = lock_for(&store, "res:1").acquire_guard(false).unwrap();
        let err = lock_for(&store, "res:1").acquire_guard(false).unwrap_err();
        assert!(matches!(err, Error::LockAcquisition { .. }));
    }
}
