//! CrewSync - concurrency control and conflict detection for workforce
//! operations backends
//!
//! Multiple application-server processes mutate the same attendance rows,
//! tour schedules, work orders, and helpdesk tickets at once. This crate is
//! the write-side discipline that keeps those records consistent, plus the
//! analytics that mine the change log for edits that collided anyway.
//!
//! # Quick start
//!
//! ```ignore
//! use crewsync::{
//!     AtomicFieldUpdater, EntityRef, LockRegistry, MemoryEntityStore, MemoryLockStore,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryEntityStore::new());
//! let registry = Arc::new(LockRegistry::with_builtin_classes(Arc::new(MemoryLockStore::new())));
//! let updater = AtomicFieldUpdater::new(Arc::clone(&store), registry);
//!
//! let shift = EntityRef::new("attendance", "2026-08-30:site-4");
//! updater.append_bounded(&shift, "punches", serde_json::json!({"worker": 17}), Some(500))?;
//! ```
//!
//! # Architecture
//!
//! - locking: [`LockStore`], [`DistributedLock`], [`LockRegistry`] — a
//!   best-effort distributed mutex over an atomic key-value store
//! - writes: [`RetryExecutor`], [`OptimisticVersionGuard`],
//!   [`AtomicFieldUpdater`] — bounded retry, compare-and-swap versioning,
//!   and lock-protected read-modify-write
//! - analytics: [`OperationLog`], [`ConflictDetector`], [`ConflictBoard`],
//!   [`FeatureExtractor`] — retrospective conflict mining over the
//!   append-only change log

pub use crewsync_core::{
    ConflictRecord, ConflictType, EntityRef, EntityStore, Error, FieldChange, FieldMap, Operation,
    OperationLogEntry, ResolutionStrategy, Result, Severity, VersionedRecord,
};

pub use crewsync_lockstore::{
    DistributedLock, LockConfig, LockGuard, LockRegistry, LockStore, MemoryLockStore,
};

pub use crewsync_storage::MemoryEntityStore;

pub use crewsync_concurrency::{
    with_optimistic_lock, AtomicFieldUpdater, OptimisticVersionGuard, RetryExecutor, RetryPolicy,
    DEFAULT_OPTIMISTIC_ATTEMPTS,
};

pub use crewsync_conflict::{
    ConflictBoard, ConflictDetector, ConflictStatistics, DetectorConfig, FeatureExtractor,
    FeatureRow, OperationLog,
};
