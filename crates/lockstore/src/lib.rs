//! Distributed locking for CrewSync
//!
//! Best-effort mutual exclusion across application-server processes, backed
//! by an external atomic key-value store:
//! - [`LockStore`]: the store seam (set-if-absent with TTL, token-checked
//!   delete and extend)
//! - [`MemoryLockStore`]: in-process implementation for tests and
//!   single-node deployments
//! - [`DistributedLock`] / [`LockGuard`]: named mutex with TTL self-expiry
//!   and guaranteed release on every exit path
//! - [`LockRegistry`]: per-resource-class lock presets and key construction
//!
//! The guarantee is best-effort: TTL expiry of a crashed holder lets others
//! proceed, so this reduces lost updates rather than eliminating them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod registry;
pub mod store;

pub use lock::{DistributedLock, LockGuard};
pub use registry::{LockConfig, LockRegistry};
pub use store::{LockStore, MemoryLockStore};
