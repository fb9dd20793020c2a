//! Concurrency layer for CrewSync
//!
//! The write-side discipline that keeps shared mutable records consistent
//! across application-server processes:
//! - [`RetryExecutor`] / [`RetryPolicy`]: bounded exponential-backoff retry
//!   for transient failures
//! - [`OptimisticVersionGuard`] / [`with_optimistic_lock`]: compare-and-swap
//!   updates against a per-record version
//! - [`AtomicFieldUpdater`]: lock-protected read-modify-write of
//!   semi-structured payload fields

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod retry;
pub mod version;

pub use atomic::AtomicFieldUpdater;
pub use retry::{RetryExecutor, RetryPolicy};
pub use version::{with_optimistic_lock, OptimisticVersionGuard, DEFAULT_OPTIMISTIC_ATTEMPTS};
