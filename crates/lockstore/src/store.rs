//! Lock store seam and in-memory implementation
//!
//! The store must offer three atomic operations, all a Redis-compatible
//! server can provide (`SET NX EX`, `GET` + conditional `DEL`/`EXPIRE`):
//! set-if-absent with TTL, compare-and-delete by token, and
//! compare-and-extend by token.
//!
//! [`MemoryLockStore`] keeps leases in a concurrent map and expires them
//! lazily: an expired lease is treated as absent by every operation, so no
//! background sweeper is needed.

use crewsync_core::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Atomic key-value store seam for distributed locking
///
/// All three operations must be atomic with respect to one another for a
/// given key. The store is the only authority on lock ownership: local state
/// means nothing once a TTL can expire independently.
pub trait LockStore: Send + Sync {
    /// Store `token` under `key` with the given TTL, only if `key` is absent
    ///
    /// Returns `true` if the key was set (lock acquired).
    fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key`, only if it currently holds `token`
    ///
    /// Returns `true` if the key was deleted. A `false` return means the
    /// lock expired and may have been re-acquired by someone else.
    fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool>;

    /// Push the expiry of `key` to `ttl` from now, only if it currently
    /// holds `token`
    ///
    /// Returns `true` if the expiry was updated.
    fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Lease {
    token: String,
    expires_at: Instant,
}

impl Lease {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process lock store with lazy TTL expiry
///
/// Leases live in a sharded concurrent map; the per-shard entry lock makes
/// each operation atomic for its key. Suitable for tests and for single-node
/// deployments where all application processes share this instance.
#[derive(Default)]
pub struct MemoryLockStore {
    leases: DashMap<String, Lease>,
}

impl MemoryLockStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) leases, for diagnostics
    pub fn live_leases(&self) -> usize {
        let now = Instant::now();
        self.leases.iter().filter(|l| !l.is_expired(now)).count()
    }
}

impl LockStore for MemoryLockStore {
    fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let lease = Lease {
            token: token.to_string(),
            expires_at: now + ttl,
        };
        match self.leases.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(lease);
                Ok(true)
            }
            Entry::Occupied(mut slot) => {
                if slot.get().is_expired(now) {
                    slot.insert(lease);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self
            .leases
            .remove_if(key, |_, lease| lease.token == token && !lease.is_expired(now));
        Ok(removed.is_some())
    }

    fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.leases.get_mut(key) {
            Some(mut lease) if lease.token == token && !lease.is_expired(now) => {
                lease.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
